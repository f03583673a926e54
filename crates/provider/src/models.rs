//! Request and response bodies exchanged with the provider.

use serde::{Deserialize, Serialize};
use vidgen_core::job::GenerationParams;
use vidgen_core::progress::map_upstream_status;
use vidgen_core::status::JobStatus;

/// Body of `POST {base}/videos`.
#[derive(Debug, Serialize)]
pub struct CreateVideoBody<'a> {
    pub prompt: &'a str,
    pub seconds: u32,
    pub resolution: &'a str,
    pub style: &'a str,
    pub aspect_ratio: &'a str,
}

impl<'a> From<&'a GenerationParams> for CreateVideoBody<'a> {
    fn from(params: &'a GenerationParams) -> Self {
        Self {
            prompt: &params.prompt,
            seconds: params.duration,
            resolution: &params.resolution,
            style: &params.style,
            aspect_ratio: &params.aspect_ratio,
        }
    }
}

/// A provider-side video job as returned by create and get.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderJob {
    pub id: String,
    /// Provider's native status vocabulary, e.g. `queued`, `in_progress`.
    pub status: String,
    /// Completion percentage, if the provider exposes one.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<ProviderFailure>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl ProviderJob {
    /// Canonical status, or `None` for vocabulary we do not recognise.
    pub fn canonical_status(&self) -> Option<JobStatus> {
        map_upstream_status(&self.status)
    }

    pub fn failure_message(&self) -> Option<String> {
        self.error.as_ref().and_then(ProviderFailure::message)
    }
}

/// Failure details attached to a failed provider job.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderFailure {
    Message(String),
    Detail {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
}

impl ProviderFailure {
    pub fn message(&self) -> Option<String> {
        match self {
            ProviderFailure::Message(m) => Some(m.clone()),
            ProviderFailure::Detail { message, code } => message.clone().or_else(|| code.clone()),
        }
    }
}

/// Body of `GET {base}/videos/{id}/progress`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProgress {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
}

impl ProviderProgress {
    pub fn canonical_status(&self) -> Option<JobStatus> {
        self.status.as_deref().and_then(map_upstream_status)
    }
}

/// Body of `GET {base}/videos/{id}/download`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DownloadResponse {
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl DownloadResponse {
    pub(crate) fn into_url(self) -> Option<String> {
        let usable = |u: &String| !u.trim().is_empty();
        self.download_url
            .filter(usable)
            .or_else(|| self.video_url.filter(usable))
    }
}
