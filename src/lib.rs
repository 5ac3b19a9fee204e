pub mod app;
pub mod config;
pub mod constants;
pub mod errors;
pub mod http;
pub mod managers;
pub mod services;
pub mod utils;
