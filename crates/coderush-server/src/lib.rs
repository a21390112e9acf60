pub mod chat;
pub mod config;
pub mod database;
pub mod handlers;
pub mod knowledge;
pub mod services;
pub mod state;
pub mod utils;
