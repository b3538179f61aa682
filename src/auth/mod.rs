use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod errors;
pub mod handlers;
pub mod memory;
pub mod notify;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use errors::AuthError;
pub use services::{AuthService, AuthSettings};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
