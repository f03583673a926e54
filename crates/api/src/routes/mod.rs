pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /gen                 submit (POST), status or list (GET)
/// /progress            progress snapshot (GET ?id=)
/// /download            redirect to finished video (GET ?id=)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(jobs::router())
}
