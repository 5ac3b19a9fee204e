pub mod execution;
pub mod results;
pub mod ssh;
