use vidgen_core::error::CoreError;

/// Longest provider error body carried into a user-visible message.
const MAX_MESSAGE_LEN: usize = 300;

/// Errors from the provider REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No API key is configured. Checked on every call, not at startup.
    #[error("Provider API key is not configured")]
    MissingCredentials,

    /// The configured base URL cannot be used to build endpoint URLs.
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider has no job with this id (HTTP 404).
    #[error("Video {0} not found at provider")]
    NotFound(String),

    /// The provider returned a non-2xx status other than 404.
    #[error("Provider API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// A 2xx response was missing a field the client needs.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredentials => CoreError::Configuration(err.to_string()),
            ProviderError::InvalidUrl(_) => CoreError::Configuration(err.to_string()),
            ProviderError::NotFound(id) => CoreError::job_not_found(id),
            ProviderError::ApiError { status, message } => CoreError::Upstream {
                status: Some(status),
                message,
            },
            ProviderError::Request(e) => CoreError::Upstream {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            ProviderError::InvalidResponse(msg) => CoreError::Upstream {
                status: None,
                message: msg,
            },
        }
    }
}

/// Pull a human-readable message out of a provider error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; otherwise falls back to the raw body, then to the
/// status reason phrase. The result is truncated.
pub(crate) fn extract_message(body: &str, fallback: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let message = match from_json {
        Some(m) if !m.trim().is_empty() => m,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => fallback.to_string(),
    };

    truncate(message)
}

fn truncate(mut message: String) -> String {
    if message.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
        message.push_str("...");
    }
    message
}
