//! REST client for the video-generation provider.
//!
//! Wraps the provider HTTP API (job creation, status, progress and
//! download-URL lookup) using [`reqwest`] with bearer-token
//! authentication.

use std::time::Duration;

use reqwest::Url;
use vidgen_core::job::GenerationParams;

use crate::error::{extract_message, ProviderError};
use crate::models::{CreateVideoBody, DownloadResponse, ProviderJob, ProviderProgress};

/// Default provider base URL.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL, e.g. `https://api.example.com/v1`.
    pub api_url: String,
    /// Bearer token. `None` is accepted at construction time and reported
    /// as [`ProviderError::MissingCredentials`] on the first call.
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP client for the provider's video endpoints.
pub struct ProviderApi {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl ProviderApi {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self {
            client,
            api_url: config.api_url,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            request_timeout: config.request_timeout,
        }
    }

    /// Submit a new generation job. Sends `POST {base}/videos`.
    pub async fn create_video(&self, params: &GenerationParams) -> Result<ProviderJob, ProviderError> {
        let key = self.api_key()?;
        let url = self.endpoint(&["videos"])?;

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .timeout(self.request_timeout)
            .json(&CreateVideoBody::from(params))
            .send()
            .await?;

        let job: ProviderJob = Self::parse_response(response, None).await?;
        tracing::info!(provider_job_id = %job.id, status = %job.status, "Provider job created");
        Ok(job)
    }

    /// Fetch a job's current state. Sends `GET {base}/videos/{id}`.
    pub async fn get_video(&self, id: &str) -> Result<ProviderJob, ProviderError> {
        let response = self.authorized_get(&["videos", id]).await?;
        Self::parse_response(response, Some(id)).await
    }

    /// Fetch a job's progress. Sends `GET {base}/videos/{id}/progress`.
    pub async fn get_progress(&self, id: &str) -> Result<ProviderProgress, ProviderError> {
        let response = self.authorized_get(&["videos", id, "progress"]).await?;
        Self::parse_response(response, Some(id)).await
    }

    /// Resolve the download URL of a finished video. Sends
    /// `GET {base}/videos/{id}/download` and reads `download_url`, falling
    /// back to `video_url`.
    pub async fn get_download_url(&self, id: &str) -> Result<String, ProviderError> {
        let response = self.authorized_get(&["videos", id, "download"]).await?;
        let body: DownloadResponse = Self::parse_response(response, Some(id)).await?;
        body.into_url().ok_or_else(|| {
            ProviderError::InvalidResponse(format!("no download URL returned for video {id}"))
        })
    }

    // ---- private helpers ----

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials)
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url =
            Url::parse(&self.api_url).map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidUrl(self.api_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorized_get(&self, segments: &[&str]) -> Result<reqwest::Response, ProviderError> {
        let key = self.api_key()?;
        let url = self.endpoint(segments)?;
        Ok(self
            .client
            .get(url)
            .bearer_auth(key)
            .timeout(self.request_timeout)
            .send()
            .await?)
    }

    /// Map non-2xx responses onto [`ProviderError`]. A 404 for a request
    /// keyed by `id` becomes [`ProviderError::NotFound`].
    async fn ensure_success(
        response: reqwest::Response,
        id: Option<&str>,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(ProviderError::NotFound(id.to_string()));
            }
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let reason = status.canonical_reason().unwrap_or("Unknown status");
        Err(ProviderError::ApiError {
            status: status.as_u16(),
            message: extract_message(&body, reason),
        })
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        id: Option<&str>,
    ) -> Result<T, ProviderError> {
        let response = Self::ensure_success(response, id).await?;
        Ok(response.json::<T>().await?)
    }
}
