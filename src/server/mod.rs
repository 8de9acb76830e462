//! HTTP surface: routing, handlers, rate limiting and the serve loop.

mod handlers;
mod rate_limit;
mod routes;
mod state;

pub use handlers::{HealthResponse, RateLimitInfo};
pub use rate_limit::{RateLimiter, client_identity};
pub use routes::build_router;
pub use state::AppState;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ResolvedConfig;

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: &ResolvedConfig) -> Result<()> {
    let state = AppState::from_config(config).await?;
    let router = build_router(state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Translation gateway listening on http://{addr}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        () = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
