pub mod config;
mod config_env;
pub mod llm;
pub mod messages;
pub mod models;
pub mod repos;
pub mod session;
