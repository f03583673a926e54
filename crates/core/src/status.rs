//! Job lifecycle status and its transition rules.

use serde::{Deserialize, Serialize};

/// Canonical job status.
///
/// ```text
/// pending ──> processing ──> completed
///    │             └───────> failed
///    └──────> completed | failed
/// ```
///
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Position in the forward-only ordering. Both terminal states share
    /// the highest rank.
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Staying in the same non-terminal status is allowed (progress updates
    /// within `processing`); leaving a terminal status never is.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
