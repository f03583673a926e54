//! Route definitions for the generation job endpoints.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST   /gen              -> submit_generation
/// GET    /gen              -> get_generation (list without ?id)
/// GET    /progress?id=     -> get_progress
/// GET    /download?id=     -> download
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/gen",
            get(jobs::get_generation).post(jobs::submit_generation),
        )
        .route("/progress", get(jobs::get_progress))
        .route("/download", get(jobs::download))
}
