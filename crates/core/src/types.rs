use std::fmt;

use serde::{Deserialize, Serialize};

/// Timestamp type used on every job record.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Prefix for locally generated job identifiers.
const JOB_ID_PREFIX: &str = "video_";

/// Opaque job identifier.
///
/// Locally generated ids look like `video_<32 hex chars>`; in upstream mode
/// the provider's own id is used verbatim, so no format is assumed when
/// parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh, unique local identifier.
    pub fn generate() -> Self {
        Self(format!("{JOB_ID_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
