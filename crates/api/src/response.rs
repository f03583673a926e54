//! Shared response envelope types for API handlers.
//!
//! Successful responses use a `{ "success": true, "data": ..., "message"? }`
//! envelope. Failures are rendered by [`crate::error::AppError`] with
//! `success: false`.

use serde::Serialize;

/// Standard success envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(ApiResponse::ok(job)))
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}
