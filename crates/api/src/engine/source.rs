//! Progress sources: where a driver's job updates come from.
//!
//! [`SimulatedSource`] replays the fixed checkpoint schedule on a timer.
//! [`UpstreamSource`] polls the provider and translates its native state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vidgen_core::error::CoreError;
use vidgen_core::job::JobUpdate;
use vidgen_core::progress::{
    coarse_progress, normalize_percent, upstream_step_label, SIMULATION_CHECKPOINTS,
};
use vidgen_core::status::JobStatus;
use vidgen_core::types::JobId;
use vidgen_provider::models::{ProviderJob, ProviderProgress};
use vidgen_provider::VideoProvider;

/// Message recorded when the provider reports failure without details.
const UPSTREAM_FAILURE_MESSAGE: &str = "Video generation failed at provider";

/// A stream of updates for one job.
#[async_trait]
pub trait ProgressSource: Send {
    /// Wait for and return the next update.
    ///
    /// `Ok(None)` means the source is exhausted. An `Err` is fatal for the
    /// job: the driver records it as `failed`.
    async fn next_update(&mut self, job_id: &JobId) -> Result<Option<JobUpdate>, CoreError>;
}

// ---------------------------------------------------------------------------
// Simulated
// ---------------------------------------------------------------------------

/// Replays [`SIMULATION_CHECKPOINTS`], one every `step`.
pub struct SimulatedSource {
    step: Duration,
    asset_base_url: String,
    next: usize,
}

impl SimulatedSource {
    pub fn new(step: Duration, asset_base_url: impl Into<String>) -> Self {
        Self {
            step,
            asset_base_url: asset_base_url.into(),
            next: 0,
        }
    }
}

#[async_trait]
impl ProgressSource for SimulatedSource {
    async fn next_update(&mut self, job_id: &JobId) -> Result<Option<JobUpdate>, CoreError> {
        let Some(checkpoint) = SIMULATION_CHECKPOINTS.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        tokio::time::sleep(self.step).await;

        if checkpoint.progress >= 100 {
            return Ok(Some(JobUpdate::Complete {
                result_location: format!("{}/{job_id}.mp4", self.asset_base_url),
                thumbnail_location: Some(format!("{}/{job_id}.jpg", self.asset_base_url)),
            }));
        }

        Ok(Some(JobUpdate::Advance {
            status: JobStatus::Processing,
            progress: checkpoint.progress,
            step: checkpoint.step.to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Polls the provider every `poll_interval` and reports its state.
pub struct UpstreamSource {
    provider: Arc<dyn VideoProvider>,
    poll_interval: Duration,
}

impl UpstreamSource {
    pub fn new(provider: Arc<dyn VideoProvider>, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
        }
    }
}

#[async_trait]
impl ProgressSource for UpstreamSource {
    async fn next_update(&mut self, job_id: &JobId) -> Result<Option<JobUpdate>, CoreError> {
        tokio::time::sleep(self.poll_interval).await;
        let remote = self.provider.get_job(job_id.as_str()).await?;
        Ok(Some(update_from_provider_job(job_id, &remote)))
    }
}

/// Location served for a completed upstream job the provider gave no URL for.
pub fn download_route(job_id: &JobId) -> String {
    format!("/api/download?id={job_id}")
}

/// Translate a provider job snapshot into a canonical update.
///
/// Unrecognised provider statuses are treated as still processing.
pub fn update_from_provider_job(job_id: &JobId, remote: &ProviderJob) -> JobUpdate {
    let status = remote.canonical_status().unwrap_or_else(|| {
        tracing::warn!(job_id = %job_id, status = %remote.status, "Unrecognised provider status");
        JobStatus::Processing
    });

    match status {
        JobStatus::Completed => JobUpdate::Complete {
            result_location: remote
                .video_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| download_route(job_id)),
            thumbnail_location: remote.thumbnail_url.clone().filter(|u| !u.trim().is_empty()),
        },
        JobStatus::Failed => JobUpdate::Fail {
            message: remote
                .failure_message()
                .unwrap_or_else(|| UPSTREAM_FAILURE_MESSAGE.to_string()),
        },
        active => advance(active, remote.progress),
    }
}

/// Translate a non-terminal provider progress snapshot into a canonical
/// update.
///
/// Terminal snapshots yield `None`: the result location and failure reason
/// only come with the full job from `get_job`.
pub fn update_from_provider_progress(remote: &ProviderProgress) -> Option<JobUpdate> {
    match remote.canonical_status() {
        Some(status) if status.is_terminal() => None,
        Some(active) => Some(advance(active, remote.progress)),
        None => Some(advance(JobStatus::Processing, remote.progress)),
    }
}

fn advance(status: JobStatus, percent: Option<f64>) -> JobUpdate {
    JobUpdate::Advance {
        status,
        progress: percent
            .map(normalize_percent)
            .unwrap_or_else(|| coarse_progress(status)),
        step: upstream_step_label(status).to_string(),
    }
}
