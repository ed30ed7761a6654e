//! Listener binding and the serve loop.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use courier_core::Config;
use tokio::net::TcpListener;

/// Bind the configured port and serve until SIGINT or SIGTERM.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let listener = bind(config.server_port).await?;

    tracing::info!(
        storage_backend = %config.storage_backend,
        public_base_url = %config.public_base_url,
        signed_url_ttl_secs = config.signed_url_ttl_secs,
        "Server configured"
    );

    serve(listener, app, shutdown_signal()).await
}

pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

/// Serve `app` on `listener`. Once `shutdown` resolves, new connections are
/// refused and in-flight requests run to completion.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Listener has no local address")?;
    tracing::info!(addr = %addr, "Accepting connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server terminated with an error")?;

    tracing::info!(addr = %addr, "Server stopped");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM. If a handler cannot be
/// installed, that signal is ignored rather than shutting down.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "SIGINT handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutdown requested, draining connections");
}
