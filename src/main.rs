use anyhow::Context;
use tracing_subscriber::EnvFilter;

use edufocus_api::app::{app, AppState};
use edufocus_api::config::config;
use edufocus_api::database::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up EDUFOCUS_DATA_DIR, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edufocus_api=info,tower_http=info")),
        )
        .init();

    let config = config();
    tracing::info!("Starting EduFocus API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("SECURITY_JWT_SECRET is not set; every /api request will be rejected");
    }

    let databases = DatabaseManager::connect(config.database.clone())
        .await
        .context("failed to open directory database")?;

    let state = AppState::new(databases.clone(), config.security.clone());
    let router = app(state, config.api.enable_request_logging);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("EduFocus API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    databases.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
