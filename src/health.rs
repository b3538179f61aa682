use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api/hello", get(hello))
        .route("/test", get(store_check))
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello from the portal auth backend!" }))
}

pub async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from the backend API!" }))
}

#[derive(Debug, Serialize)]
pub struct StoreCheck {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub store_name: Option<String>,
    pub connection_status: String,
    pub collections: Vec<String>,
}

fn set_or_not(value: &Option<String>) -> String {
    let label = if value.is_some() { "set" } else { "not set" };
    label.to_string()
}

fn truncate(msg: &str) -> String {
    msg.chars().take(50).collect()
}

/// Reports whether the user store answers. Store errors are part of the report, never a failure.
pub async fn store_check(State(state): State<AppState>) -> Json<StoreCheck> {
    let mut check = StoreCheck {
        backend: "running".into(),
        database: "not available".into(),
        database_url: set_or_not(&state.config.database_url),
        database_name: set_or_not(&state.config.database_name),
        store_name: None,
        connection_status: "not connected".into(),
        collections: Vec::new(),
    };

    match state.store().describe().await {
        Ok(info) => {
            check.database = "connected and working".into();
            check.connection_status = "connected".into();
            check.store_name = info.name;
            check.collections = info.collections.into_iter().take(10).collect();
        }
        Err(e) => {
            warn!(error = %e, "store check failed");
            check.database = format!("error: {}", truncate(&e.to_string()));
        }
    }

    Json(check)
}
