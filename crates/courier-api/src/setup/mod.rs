//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use courier_core::Config;
use std::sync::Arc;

/// Validate configuration, connect storage, and build the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    tracing::info!(
        environment = %config.environment,
        storage_backend = %config.storage_backend,
        "Configuration loaded and validated successfully"
    );

    let storage = courier_storage::create_storage(&config)
        .await
        .context("Failed to initialize storage backend")?;

    let state = Arc::new(AppState::new(config.clone(), storage));
    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}
