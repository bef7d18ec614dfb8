//! HTTP API
//!
//! Thin axum layer over [`PlannerService`]. Every planning request runs under a
//! child of the server-wide cancellation token, so shutdown or a dropped
//! connection stops the session at its next suspension point.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::planner::PlannerService;

pub use handlers::{ErrorBody, ValidateRequest, status_for_kind};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<PlannerService>,
    /// Cancelled on shutdown; requests use child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(planner: PlannerService, shutdown: CancellationToken) -> Self {
        Self {
            planner: Arc::new(planner),
            shutdown,
        }
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/api/v1/plan", post(handlers::plan))
        .route("/api/v1/validate", post(handlers::validate))
        .route("/api/v1/stats", get(handlers::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `state.shutdown` is cancelled, then drain for at most `grace`
pub async fn serve(listener: TcpListener, state: AppState, grace: Duration) -> Result<()> {
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!(%addr, "planner API listening");

    let shutdown = state.shutdown.clone();
    let signal = shutdown.clone();
    let server = async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    };
    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result.context("HTTP server failed")?,
        _ = deadline => warn!(grace_ms = grace.as_millis() as u64, "shutdown grace period elapsed, dropping open connections"),
    }
    info!("planner API stopped");
    Ok(())
}
