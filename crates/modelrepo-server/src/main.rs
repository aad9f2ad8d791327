//! Runs the model repository development server.
//!
//! Usage: `modelrepo-server [config.json]`. Without an argument the config is
//! read from `MODELREPO_SERVER_CONFIG` (if set) and `MODELREPO_BIND`.

use std::path::Path;

use anyhow::{Context, Result};
use modelrepo_server::{create_router, AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(Path::new(&path))?,
        None => ServerConfig::from_env()?,
    };

    let state = AppState::from_config(&config)?;
    tracing::info!(
        private_repositories = state.repository_count(),
        "repository keys loaded"
    );

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!(addr = %listener.local_addr()?, "model repository server listening");

    axum::serve(listener, create_router(state))
        .await
        .context("Server error")
}
