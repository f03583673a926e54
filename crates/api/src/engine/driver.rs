//! Per-job progress drivers.
//!
//! A driver is a spawned task that pulls updates from a [`ProgressSource`]
//! and applies them to the store until the job is terminal or the service
//! shuts down. [`DriverRegistry`] guarantees at most one live driver per
//! job id and keeps every task's outcome observable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vidgen_core::job::{JobUpdate, TransitionError};
use vidgen_core::status::JobStatus;
use vidgen_core::types::JobId;

use crate::engine::source::ProgressSource;
use crate::store::{JobStore, StoreError};

/// Failure message recorded for jobs interrupted by shutdown.
pub const SHUTDOWN_MESSAGE: &str = "Generation interrupted: service shutting down";

/// Failure message recorded when a driver task panics.
const CRASH_MESSAGE: &str = "Progress driver crashed";

/// Failure message recorded when a source ends without a terminal update.
const EXHAUSTED_MESSAGE: &str = "Progress source ended before the job finished";

/// How a driver task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    /// The job reached `completed`.
    Completed,
    /// The job reached `failed`, from the source or from a driver error.
    Failed,
    /// Shutdown interrupted the job; it was recorded as failed.
    Cancelled,
    /// The job disappeared from the store while being driven.
    Abandoned,
}

/// Drive one job to a terminal state.
pub async fn drive(
    job_id: JobId,
    store: Arc<JobStore>,
    mut source: Box<dyn ProgressSource>,
    cancel: CancellationToken,
) -> DriverOutcome {
    tracing::debug!(job_id = %job_id, "Progress driver started");

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %job_id, "Progress driver interrupted by shutdown");
                fail(&store, &job_id, SHUTDOWN_MESSAGE).await;
                return DriverOutcome::Cancelled;
            }
            next = source.next_update(&job_id) => next,
        };

        let update = match next {
            Ok(Some(update)) => update,
            Ok(None) => {
                tracing::warn!(job_id = %job_id, "Progress source exhausted early");
                return fail(&store, &job_id, EXHAUSTED_MESSAGE).await;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Progress driver failed");
                return fail(&store, &job_id, &e.to_string()).await;
            }
        };

        match store.apply(&job_id, update).await {
            Ok(job) => {
                tracing::debug!(
                    job_id = %job_id,
                    status = %job.status(),
                    progress = job.progress(),
                    "Job progressed",
                );
                if job.is_terminal() {
                    tracing::info!(job_id = %job_id, status = %job.status(), "Job finished");
                    return terminal_outcome(job.status());
                }
            }
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(job_id = %job_id, "Job removed while being driven");
                return DriverOutcome::Abandoned;
            }
            Err(StoreError::Rejected {
                source: TransitionError::AlreadyTerminal(status),
                ..
            }) => {
                tracing::debug!(job_id = %job_id, %status, "Job already terminal");
                return terminal_outcome(status);
            }
            Err(e) => {
                // Out-of-order provider snapshot; keep polling.
                tracing::debug!(job_id = %job_id, error = %e, "Update skipped");
            }
        }
    }
}

fn terminal_outcome(status: JobStatus) -> DriverOutcome {
    match status {
        JobStatus::Failed => DriverOutcome::Failed,
        _ => DriverOutcome::Completed,
    }
}

/// Record `message` as the job's failure, ignoring an already-terminal job.
async fn fail(store: &JobStore, job_id: &JobId, message: &str) -> DriverOutcome {
    let update = JobUpdate::Fail {
        message: message.to_string(),
    };
    match store.apply(job_id, update).await {
        Ok(_) => DriverOutcome::Failed,
        Err(StoreError::NotFound(_)) => DriverOutcome::Abandoned,
        Err(StoreError::Rejected { .. }) => DriverOutcome::Failed,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tracks spawned drivers by job id.
pub struct DriverRegistry {
    tasks: Mutex<HashMap<JobId, JoinHandle<DriverOutcome>>>,
    cancel: CancellationToken,
}

impl DriverRegistry {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    /// Spawn a driver for `job_id` unless one is already running.
    ///
    /// Returns `true` if a new driver was started.
    pub async fn spawn(
        &self,
        job_id: JobId,
        store: Arc<JobStore>,
        source: Box<dyn ProgressSource>,
    ) -> bool {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, handle| !handle.is_finished());

        if tasks.contains_key(&job_id) {
            return false;
        }
        if self.cancel.is_cancelled() {
            tracing::warn!(job_id = %job_id, "Not starting driver during shutdown");
            fail(&store, &job_id, SHUTDOWN_MESSAGE).await;
            return false;
        }

        let inner = tokio::spawn(drive(
            job_id.clone(),
            Arc::clone(&store),
            source,
            self.cancel.clone(),
        ));

        let id = job_id.clone();
        let supervisor = tokio::spawn(async move {
            match inner.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "Progress driver task aborted");
                    fail(&store, &id, CRASH_MESSAGE).await
                }
            }
        });

        tasks.insert(job_id, supervisor);
        true
    }

    /// Number of drivers still running.
    pub async fn active_count(&self) -> usize {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Wait for the driver of `job_id` to finish and return its outcome.
    ///
    /// Returns `None` if no driver is tracked for the id.
    pub async fn wait(&self, job_id: &JobId) -> Option<DriverOutcome> {
        let handle = self.tasks.lock().await.remove(job_id)?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Driver supervisor failed");
                Some(DriverOutcome::Failed)
            }
        }
    }

    /// Cancel every driver and wait up to `timeout` for them to record
    /// their interruption.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();

        let handles: Vec<JoinHandle<DriverOutcome>> =
            self.tasks.lock().await.drain().map(|(_, h)| h).collect();
        if handles.is_empty() {
            return;
        }

        let count = handles.len();
        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(_) => tracing::info!(count, "Progress drivers stopped"),
            Err(_) => tracing::warn!(count, "Timed out waiting for progress drivers to stop"),
        }
    }
}
