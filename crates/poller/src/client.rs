//! HTTP client for the job service's `/api` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use vidgen_core::job::{GenerationRequest, Job, JobProgress};
use vidgen_core::types::JobId;

use crate::error::PollError;
use crate::poller::StatusSource;

/// Default job service base URL.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:3000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response envelope shared by every job service endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for submitting jobs and reading their progress.
#[derive(Clone)]
pub struct JobServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl JobServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit a generation. Sends `POST /api/gen`.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<Job, PollError> {
        let response = self
            .client
            .post(format!("{}/api/gen", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let job: Job = Self::parse_response(response, None).await?;
        tracing::info!(job_id = %job.id(), "Generation submitted");
        Ok(job)
    }

    /// Read a job's progress. Sends `GET /api/progress?id=`.
    pub async fn progress(&self, id: &JobId) -> Result<JobProgress, PollError> {
        let response = self
            .client
            .get(format!("{}/api/progress", self.base_url))
            .query(&[("id", id.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::parse_response(response, Some(id)).await
    }

    /// Unwrap the envelope, mapping error statuses onto [`PollError`].
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
        id: Option<&JobId>,
    ) -> Result<T, PollError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(match id {
                Some(id) if status == reqwest::StatusCode::NOT_FOUND => {
                    PollError::NotFound(id.to_string())
                }
                _ => PollError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| PollError::InvalidResponse(e.to_string()))?;
        match envelope.data {
            Some(data) if envelope.success => Ok(data),
            _ => Err(PollError::InvalidResponse(
                envelope
                    .error
                    .unwrap_or_else(|| "response carried no data".to_string()),
            )),
        }
    }
}

#[async_trait]
impl StatusSource for JobServiceClient {
    async fn fetch(&self, id: &JobId) -> Result<JobProgress, PollError> {
        self.progress(id).await
    }
}
