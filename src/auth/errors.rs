use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the auth workflows.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    Conflict,
    #[error("Invalid email or password")]
    Unauthenticated,
    #[error("Invalid code or email")]
    InvalidRequest,
    #[error("Reset code expired")]
    Expired,
    #[error("password hashing error: {0}")]
    Hash(String),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::InvalidRequest | AuthError::Expired => StatusCode::BAD_REQUEST,
            AuthError::Hash(_) | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Unreadable bodies fall in the same class as field validation failures.
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status.is_server_error() {
            error!(error = %self, "auth request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}
