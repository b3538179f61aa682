use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use portal_auth::{
    app::{build_app, serve},
    auth::{notify::LogNotifier, repo::PgUserRepository},
    config::AppConfig,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "portal_auth=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("parse listen address")?;

    let Some(database_url) = config.database_url.clone() else {
        tracing::warn!("DATABASE_URL not set; using in-memory user store");
        return serve(build_app(AppState::in_memory(config)), addr).await;
    };

    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&database_url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run migrations")?;

    let state = AppState::from_parts(
        Arc::new(config),
        Arc::new(PgUserRepository::new(db.clone())),
        Arc::new(LogNotifier),
    );

    let served = serve(build_app(state), addr).await;
    db.close().await;
    tracing::info!("database pool closed");
    served
}
