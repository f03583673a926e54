//! Periodic eviction of finished jobs.
//!
//! Spawns a background task that removes terminal jobs older than the
//! configured retention period and trims the store back under its job
//! cap. Runs on a fixed interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use vidgen_core::types::Timestamp;

use crate::config::RetentionConfig;
use crate::store::JobStore;

/// Floor for the sweep period; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Run the eviction loop until `cancel` is triggered.
pub async fn run(store: Arc<JobStore>, config: RetentionConfig, cancel: CancellationToken) {
    tracing::info!(
        retention_secs = config.job_retention.as_secs(),
        max_jobs = config.max_jobs,
        interval_secs = config.sweep_interval.as_secs(),
        "Job eviction started"
    );

    let mut interval = tokio::time::interval(config.sweep_interval.max(MIN_SWEEP_INTERVAL));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job eviction stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = sweep(&store, &config).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Job eviction: removed finished jobs");
                } else {
                    tracing::debug!("Job eviction: nothing to remove");
                }
            }
        }
    }
}

/// Run a single eviction pass. Returns the number of jobs removed.
pub async fn sweep(store: &JobStore, config: &RetentionConfig) -> usize {
    store
        .evict(cutoff(config.job_retention), config.max_jobs)
        .await
}

fn cutoff(retention: Duration) -> Timestamp {
    chrono::Duration::from_std(retention)
        .ok()
        .and_then(|r| Utc::now().checked_sub_signed(r))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
