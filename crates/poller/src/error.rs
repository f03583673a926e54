/// Errors raised while talking to the job service.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Transport failure (connect, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service has no job with this id.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The service answered with an error envelope.
    #[error("Service error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A 2xx response that did not carry the expected payload.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl PollError {
    /// Whether a later fetch of the same job may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PollError::Request(_) | PollError::InvalidResponse(_) => true,
            PollError::NotFound(_) => false,
            PollError::Api { status, .. } => Self::is_retryable_status(*status),
        }
    }

    /// 5xx, 408 and 429 are worth retrying; other error statuses are not.
    pub fn is_retryable_status(status: u16) -> bool {
        status >= 500 || status == 408 || status == 429
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> PollError {
        PollError::Api {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(PollError::InvalidResponse("html".into()).is_retryable());
        assert!(api(503).is_retryable());
        assert!(api(429).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!PollError::NotFound("video_x".into()).is_retryable());
    }
}
