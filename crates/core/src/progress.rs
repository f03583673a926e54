//! Progress checkpoints, ETA estimation and upstream status mapping.

use crate::status::JobStatus;

/// Step label of a freshly created job.
pub const INITIAL_STEP: &str = "Initializing...";
/// Step label of a completed job.
pub const COMPLETE_STEP: &str = "Complete!";

/// Seconds of remaining work per missing percentage point.
const ETA_SECS_PER_PERCENT: f64 = 0.1;
/// Lower bound on a non-terminal ETA.
const MIN_ETA_SECS: f64 = 1.0;

// ---------------------------------------------------------------------------
// Local simulation checkpoints
// ---------------------------------------------------------------------------

/// One replayed step of a simulated generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub progress: u8,
    pub step: &'static str,
}

/// Fixed checkpoint sequence replayed by the simulated driver. The last
/// entry is the completion checkpoint.
pub const SIMULATION_CHECKPOINTS: [Checkpoint; 6] = [
    Checkpoint {
        progress: 10,
        step: "Processing prompt...",
    },
    Checkpoint {
        progress: 30,
        step: "Generating storyboard...",
    },
    Checkpoint {
        progress: 50,
        step: "Creating video frames...",
    },
    Checkpoint {
        progress: 75,
        step: "Applying effects and transitions...",
    },
    Checkpoint {
        progress: 90,
        step: "Finalizing video...",
    },
    Checkpoint {
        progress: 100,
        step: COMPLETE_STEP,
    },
];

/// Estimated seconds remaining for a job at `progress` percent.
///
/// `None` once the job is at 100%.
pub fn estimate_remaining_secs(progress: u8) -> Option<f64> {
    if progress >= 100 {
        return None;
    }
    Some((f64::from(100 - progress) * ETA_SECS_PER_PERCENT).max(MIN_ETA_SECS))
}

// ---------------------------------------------------------------------------
// Upstream status vocabulary
// ---------------------------------------------------------------------------

/// Map a provider's native status string onto the canonical statuses.
///
/// Matching is case-insensitive. Unknown values yield `None`; the caller
/// decides how to treat them.
pub fn map_upstream_status(native: &str) -> Option<JobStatus> {
    match native.trim().to_ascii_lowercase().as_str() {
        "queued" | "pending" | "submitted" | "created" => Some(JobStatus::Pending),
        "in_progress" | "processing" | "running" | "generating" => Some(JobStatus::Processing),
        "completed" | "succeeded" | "success" | "done" => Some(JobStatus::Completed),
        "failed" | "error" | "cancelled" | "canceled" | "expired" => Some(JobStatus::Failed),
        _ => None,
    }
}

/// Coarse progress estimate for providers that do not report percentages.
pub fn coarse_progress(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 10,
        JobStatus::Processing => 50,
        JobStatus::Completed => 100,
        JobStatus::Failed => 0,
    }
}

/// Step label shown for a job whose state comes from the provider.
pub fn upstream_step_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Queued at provider...",
        JobStatus::Processing => "Generating video...",
        JobStatus::Completed => COMPLETE_STEP,
        JobStatus::Failed => "Failed",
    }
}

/// Normalize a provider-reported percentage (which may be fractional or
/// out of range) to `0..=100`.
pub fn normalize_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
