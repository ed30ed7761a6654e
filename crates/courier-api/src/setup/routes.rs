//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use crate::utils::multipart::MULTIPART_OVERHEAD_BYTES;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use courier_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes from the configuration held in `state`.
pub fn setup_routes(state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let config = &state.config;
    let cors = setup_cors(config)?;
    crate::error::expose_error_details(!config.is_production());

    // Oversized bodies must reach the handler as a multipart error so they
    // render as a 400 policy rejection.
    let upload_body_limit =
        state.ingestion.policy().max_size_bytes() as usize + MULTIPART_OVERHEAD_BYTES;

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        upload_body_limit = upload_body_limit,
        "HTTP limits configured"
    );

    let app = Router::new()
        .route(
            "/upload",
            post(handlers::upload::upload_file).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/files/{*key}", get(handlers::files::get_file))
        .route("/health", get(handlers::health::health_check))
        .with_state(state.clone())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        if config.is_production() {
            return Err(anyhow::anyhow!("CORS_ORIGINS cannot be '*' in production"));
        }
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
