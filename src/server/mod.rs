//! HTTP and WebSocket surface of the orchestration server.

mod router;
mod state;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use router::build_router;
pub use state::ServeState;

/// Serve until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: ServeState,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, engine = state.engine_name(), "Server starting, waiting for requests...");
    axum::serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server exited unexpectedly")?;
    info!("server stopped");
    Ok(())
}
