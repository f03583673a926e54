//! Job entity, request DTOs and the state-machine methods that guard every
//! mutation.
//!
//! Fields are private so that the lifecycle invariants (forward-only status,
//! monotonic progress, 100% iff completed, result/error set only on the
//! matching terminal state) hold no matter who holds a `&mut Job`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress::{estimate_remaining_secs, COMPLETE_STEP, INITIAL_STEP};
use crate::status::JobStatus;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Request defaults
// ---------------------------------------------------------------------------

/// Default clip length in seconds.
pub const DEFAULT_DURATION_SECS: u32 = 10;
pub const DEFAULT_RESOLUTION: &str = "1080p";
pub const DEFAULT_STYLE: &str = "realistic";
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// Highest progress a job may report before it is completed.
pub const MAX_ACTIVE_PROGRESS: u8 = 99;

// ---------------------------------------------------------------------------
// Request / parameters
// ---------------------------------------------------------------------------

/// Body of `POST /api/gen`.
///
/// A missing `prompt` deserializes to an empty string so it is rejected by
/// [`GenerationRequest::validate`] with a validation error rather than by
/// the JSON extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: String,
    pub duration: Option<u32>,
    pub resolution: Option<String>,
    pub style: Option<String>,
    pub aspect_ratio: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Validate the request and resolve defaults for unspecified fields.
    ///
    /// The prompt is trimmed. Zero durations and blank strings count as
    /// unspecified.
    pub fn validate(self) -> Result<GenerationParams, CoreError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::Validation(
                "Prompt is required and must be a non-empty string".to_string(),
            ));
        }

        Ok(GenerationParams {
            prompt: prompt.to_string(),
            duration: self
                .duration
                .filter(|d| *d > 0)
                .unwrap_or(DEFAULT_DURATION_SECS),
            resolution: non_blank_or(self.resolution, DEFAULT_RESOLUTION),
            style: non_blank_or(self.style, DEFAULT_STYLE),
            aspect_ratio: non_blank_or(self.aspect_ratio, DEFAULT_ASPECT_RATIO),
        })
    }
}

fn non_blank_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Resolved, immutable generation parameters stored on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub prompt: String,
    pub duration: u32,
    pub resolution: String,
    pub style: String,
    pub aspect_ratio: String,
}

impl GenerationParams {
    /// Parameters for a job created by a lenient status lookup, which has
    /// no originating request. The prompt is empty.
    pub fn unspecified() -> Self {
        Self {
            prompt: String::new(),
            duration: DEFAULT_DURATION_SECS,
            resolution: DEFAULT_RESOLUTION.to_string(),
            style: DEFAULT_STYLE.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// A single state change requested by a progress driver.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Move forward within the non-terminal states.
    Advance {
        status: JobStatus,
        progress: u8,
        step: String,
    },
    /// Enter `completed`.
    Complete {
        result_location: String,
        thumbnail_location: Option<String>,
    },
    /// Enter `failed`.
    Fail { message: String },
}

impl JobUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobUpdate::Advance { .. })
    }
}

/// Why an update was not applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("job is already {0}")]
    AlreadyTerminal(JobStatus),

    #[error("cannot move from {from} back to {to}")]
    Backward { from: JobStatus, to: JobStatus },

    #[error("advance cannot enter terminal status {0}")]
    TerminalAdvance(JobStatus),
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A tracked unit of asynchronous video generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    id: JobId,
    status: JobStatus,
    #[serde(flatten)]
    request: GenerationParams,
    progress: u8,
    current_step: String,
    estimated_time_remaining: Option<f64>,
    result_location: Option<String>,
    thumbnail_location: Option<String>,
    error_message: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
    completed_at: Option<Timestamp>,
}

impl Job {
    /// Create a `pending` job at 0%.
    pub fn new(id: JobId, request: GenerationParams) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            request,
            progress: 0,
            current_step: INITIAL_STEP.to_string(),
            estimated_time_remaining: None,
            result_location: None,
            thumbnail_location: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn request(&self) -> &GenerationParams {
        &self.request
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn current_step(&self) -> &str {
        &self.current_step
    }

    pub fn estimated_time_remaining(&self) -> Option<f64> {
        self.estimated_time_remaining
    }

    pub fn result_location(&self) -> Option<&str> {
        self.result_location.as_deref()
    }

    pub fn thumbnail_location(&self) -> Option<&str> {
        self.thumbnail_location.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a driver update, enforcing the lifecycle invariants.
    ///
    /// Progress never decreases while the job is active and is capped at
    /// [`MAX_ACTIVE_PROGRESS`] until completion. On success `updated_at` is
    /// refreshed; on error the job is left untouched.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal(self.status));
        }

        let now = chrono::Utc::now();
        match update {
            JobUpdate::Advance {
                status,
                progress,
                step,
            } => {
                if status.is_terminal() {
                    return Err(TransitionError::TerminalAdvance(status));
                }
                if !self.status.can_transition_to(status) {
                    return Err(TransitionError::Backward {
                        from: self.status,
                        to: status,
                    });
                }
                self.status = status;
                self.progress = self.progress.max(progress.min(MAX_ACTIVE_PROGRESS));
                self.current_step = step;
                self.estimated_time_remaining = estimate_remaining_secs(self.progress);
            }
            JobUpdate::Complete {
                result_location,
                thumbnail_location,
            } => {
                self.status = JobStatus::Completed;
                self.progress = 100;
                self.current_step = COMPLETE_STEP.to_string();
                self.estimated_time_remaining = None;
                self.result_location = Some(result_location);
                self.thumbnail_location = thumbnail_location;
                self.completed_at = Some(now);
            }
            JobUpdate::Fail { message } => {
                self.status = JobStatus::Failed;
                self.progress = 0;
                self.current_step = "Failed".to_string();
                self.estimated_time_remaining = None;
                self.error_message = Some(if message.trim().is_empty() {
                    "Video generation failed".to_string()
                } else {
                    message
                });
                self.completed_at = Some(now);
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// The progress projection served by `GET /api/progress`.
    pub fn progress_view(&self) -> JobProgress {
        JobProgress {
            id: self.id.clone(),
            progress: self.progress,
            status: self.status,
            current_step: self.current_step.clone(),
            estimated_time_remaining: self.estimated_time_remaining,
            error_message: self.error_message.clone(),
        }
    }
}

/// Lightweight progress snapshot of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub id: JobId,
    pub progress: u8,
    pub status: JobStatus,
    pub current_step: String,
    #[serde(default)]
    pub estimated_time_remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
