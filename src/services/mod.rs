pub mod generation;
pub mod logger;
pub mod remote_shell;
pub mod security;
pub mod validation;
