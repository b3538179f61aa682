pub mod app;
pub mod auth;
pub mod config;
pub mod health;
pub mod state;
