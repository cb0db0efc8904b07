//! OpenAI-compatible HTTP front for boost (axum).
//!
//! Routes: `/v1/models`, `/v1/chat/completions`, `/events/{id}`,
//! `/events/{id}/ws`, plus `/` and `/health` liveness. Bearer-auth and
//! request-id middleware wrap the API surface.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`], [`AppState`],
//! [`router`].

mod app;
mod completions;
mod events;
mod middleware;
mod models;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

pub use app::{router, AppState};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";

/// Runs the server on an existing listener. Used by tests (bind to
/// `127.0.0.1:0`, then pass the listener).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("boost listening on http://{addr}");
    info!(
        "boosting {} backends, {} modules",
        state.config.backends.len(),
        state.modules.len()
    );
    if !state.config.auth_enabled() {
        warn!("no API keys specified - boost will accept all requests");
    }

    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Binds `addr` (default `0.0.0.0:8000`) and serves with state resolved
/// from the environment.
pub async fn run_serve(
    addr: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, AppState::from_env()).await
}
