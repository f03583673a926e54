pub mod jobs;

use axum::http::{Method, Uri};

use crate::error::AppError;

/// Fallback for unmatched paths, answered in the standard error envelope.
pub async fn route_not_found(method: Method, uri: Uri) -> AppError {
    AppError::NoRoute(format!("{method} {}", uri.path()))
}
