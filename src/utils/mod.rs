pub mod shell;
pub mod text;
pub mod user_paths;
