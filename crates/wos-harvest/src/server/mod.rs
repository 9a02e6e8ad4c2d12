//! Read-only HTTP service over harvested tables.
//!
//! ## Loading
//!
//! The listener starts immediately; tables are loaded in the background and
//! published to the [`TableCache`] in one swap. Until then every table route
//! answers 503 with `Retry-After`.

pub mod cache;
pub mod routes;
pub mod source;

pub use cache::{OrgState, Snapshot, TableCache};
pub use routes::{ApiError, AppState, create_router};
pub use source::{DirectorySource, LiveSource, TableSource};

use std::net::SocketAddr;
use std::sync::Arc;

/// Serve the tables produced by `source` on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns error if the listener cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    cache: Arc<TableCache>,
    source: Arc<dyn TableSource>,
) -> anyhow::Result<()> {
    let loader = Arc::clone(&cache);
    tokio::spawn(async move {
        loader.bulk_load(source.as_ref()).await;
    });

    let router = create_router(AppState::new(cache));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("HTTP server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
