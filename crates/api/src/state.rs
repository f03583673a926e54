use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::Orchestrator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job lifecycle coordinator; owns the store and the progress drivers.
    pub orchestrator: Arc<Orchestrator>,
}
