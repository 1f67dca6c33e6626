//! Configuration, shared models and per-user credentials

pub mod config;
pub mod models;
pub mod user_tokens;
