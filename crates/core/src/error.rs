/// Domain error shared by the orchestrator, the progress driver and the
/// HTTP layer.
///
/// Each variant maps onto one HTTP status class in `vidgen_api::error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing or malformed process configuration (e.g. no provider API key).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The upstream provider failed. `status` is `None` for transport-level
    /// failures (connect, timeout, decode) where no response was received.
    #[error("Upstream error: {message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing job.
    pub fn job_not_found(id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: "Job",
            id: id.into(),
        }
    }

    /// Whether a caller may reasonably retry the same operation later.
    ///
    /// Only transport failures and 5xx upstream responses qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Upstream { status: None, .. } => true,
            CoreError::Upstream {
                status: Some(status),
                ..
            } => *status >= 500,
            _ => false,
        }
    }
}
