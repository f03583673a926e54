use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Progress mode (`simulated` or `upstream`).
    pub mode: &'static str,
    /// Lookup policy for unknown ids (`strict` or `lenient`).
    pub lookup: &'static str,
    /// Number of jobs currently held in the store.
    pub jobs: usize,
    /// Number of progress drivers still running.
    pub active_drivers: usize,
}

/// GET /health -- returns service status and job counts.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: orchestrator.mode().as_str(),
        lookup: state.config.engine.lookup.as_str(),
        jobs: orchestrator.store().len().await,
        active_drivers: orchestrator.drivers().active_count().await,
    })
}

/// Mount health check routes (root level, outside `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
