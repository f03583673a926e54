//! Handlers for the generation job endpoints.
//!
//! Thin adapters over [`Orchestrator`](crate::engine::Orchestrator): they
//! extract the job id or request body, delegate, and wrap the result in
//! the [`ApiResponse`] envelope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use vidgen_core::job::GenerationRequest;
use vidgen_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Message returned alongside a freshly submitted job.
const SUBMITTED_MESSAGE: &str = "Video generation started";

/// Message for a missing or blank `id` query parameter.
const ID_REQUIRED_MESSAGE: &str = "Video ID is required";

/// `?id=` query parameter shared by the lookup endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract a non-blank job id, or fail with 400.
fn require_id(id: Option<String>) -> AppResult<JobId> {
    match id {
        Some(id) if !id.trim().is_empty() => Ok(JobId::from(id.trim())),
        _ => Err(AppError::BadRequest(ID_REQUIRED_MESSAGE.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/gen
///
/// Start a new generation. Returns the created job in `pending` status.
pub async fn submit_generation(
    State(state): State<AppState>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let job = state.orchestrator.submit(request).await?;

    Ok(Json(ApiResponse::with_message(job, SUBMITTED_MESSAGE)))
}

// ---------------------------------------------------------------------------
// Status / list
// ---------------------------------------------------------------------------

/// GET /api/gen?id=<id>
///
/// With `id`, return that job. Without `id`, list every job newest first.
pub async fn get_generation(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> AppResult<Response> {
    let Some(raw) = params.id else {
        let listing = state.orchestrator.list().await;
        let response = match listing.note {
            Some(note) => ApiResponse::with_message(listing.jobs, note),
            None => ApiResponse::ok(listing.jobs),
        };
        return Ok(Json(response).into_response());
    };

    let id = require_id(Some(raw))?;
    let job = state.orchestrator.get(&id).await?;

    Ok(Json(ApiResponse::ok(job)).into_response())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/progress?id=<id>
///
/// Lightweight progress snapshot for polling clients.
pub async fn get_progress(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> AppResult<impl IntoResponse> {
    let id = require_id(params.id)?;
    let progress = state.orchestrator.progress(&id).await?;

    Ok(Json(ApiResponse::ok(progress)))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// GET /api/download?id=<id>
///
/// Redirect (307) to the finished video.
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> AppResult<impl IntoResponse> {
    let id = require_id(params.id)?;
    let location = state.orchestrator.download_location(&id).await?;

    tracing::debug!(job_id = %id, %location, "Redirecting to video");

    Ok(Redirect::temporary(&location))
}
