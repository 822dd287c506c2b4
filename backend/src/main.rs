//! Main entry point for the Tau backend.
//!
//! This file initializes logging, the database and shared services, then
//! starts the Axum web server serving the GraphQL API and media files.

mod api;
mod app;
mod auth;
mod config;
mod database;
mod errors;
mod repositories;
mod services;
mod state;
mod utils;

use anyhow::Context;
use config::Config;
use database::Database;
use repositories::refresh_token_repository::RefreshTokenRepository;
use services::user_service::UserService;
use state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::new(&config).await?;
    let pool = db.pool().clone();

    let removed = RefreshTokenRepository::new(&pool).cleanup_expired().await?;
    if removed > 0 {
        info!("Removed {} expired refresh tokens", removed);
    }

    if let Some(admin) = &config.admin {
        UserService::new(&pool)
            .ensure_staff_user(admin)
            .await
            .context("Failed to bootstrap staff user")?;
    }

    let port = config.server_port;
    let state = AppState::new(config, pool);
    let app = app::build_router(state)?;

    let bind_address = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("Starting Tau server on port {}", port);
    axum::serve(listener, app).await?;

    db.close().await;
    Ok(())
}
