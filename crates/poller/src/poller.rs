//! Cancellable job-status polling loop.
//!
//! [`JobPoller::spawn`] fetches a job's progress immediately and then on a
//! fixed interval until the job is terminal, reporting each observation to
//! a [`PollObserver`]. The returned [`PollHandle`] owns the loop: calling
//! [`PollHandle::cancel`] or dropping the handle stops it, and no observer
//! callback starts after cancellation.
//!
//! Transient fetch errors are reported through
//! [`PollObserver::on_error`] and polling continues, unless
//! [`PollerConfig::max_consecutive_errors`] is reached. A 404 or another
//! non-retryable rejection ends polling immediately.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vidgen_core::job::JobProgress;
use vidgen_core::status::JobStatus;
use vidgen_core::types::JobId;

use crate::error::PollError;

/// Default interval between status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shorter configured intervals are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Something that can report a job's current progress.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, id: &JobId) -> Result<JobProgress, PollError>;
}

/// Receives poll observations. All methods run on the polling task.
pub trait PollObserver: Send + 'static {
    /// A non-terminal snapshot.
    fn on_progress(&mut self, _progress: &JobProgress) {}

    /// The job completed. Called at most once per poller.
    fn on_complete(&mut self, progress: &JobProgress);

    /// The job failed. Called at most once per poller.
    fn on_failed(&mut self, _progress: &JobProgress) {}

    /// A fetch failed. Polling continues unless the error is not retryable
    /// or the error budget is spent.
    fn on_error(&mut self, _error: &PollError) {}
}

/// Poller settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between fetches, raised to at least [`MIN_POLL_INTERVAL`].
    pub interval: Duration,
    /// Stop after this many fetch errors in a row. `None` polls forever.
    pub max_consecutive_errors: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_errors: None,
        }
    }
}

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(JobProgress),
    Failed(JobProgress),
    /// The service has no such job.
    NotFound,
    /// The service refused the request with a non-retryable status.
    Rejected { status: u16, message: String },
    /// The handle was cancelled or dropped first.
    Cancelled,
    /// `max_consecutive_errors` fetches failed in a row.
    GaveUp { consecutive_errors: u32 },
}

/// Held while an observer callback runs and while cancelling, so a cancel
/// never interleaves with a callback.
type Gate = Arc<Mutex<()>>;

fn enter(gate: &Gate) -> MutexGuard<'_, ()> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancels the loop when dropped.
struct CancelOnDrop {
    token: CancellationToken,
    gate: Gate,
}

impl CancelOnDrop {
    fn cancel(&self) {
        let _gate = enter(&self.gate);
        self.token.cancel();
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Owner of a running polling loop.
///
/// Dropping the handle cancels the loop.
pub struct PollHandle {
    cancel: CancelOnDrop,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Stop polling. Waits for a callback already in progress; no observer
    /// callback starts after this returns.
    ///
    /// Must not be called from inside an observer callback.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end and return its outcome.
    pub async fn join(self) -> PollOutcome {
        let PollHandle { cancel, task } = self;
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Polling task aborted");
                PollOutcome::Cancelled
            }
        };
        drop(cancel);
        outcome
    }
}

/// Spawns polling loops.
pub struct JobPoller {
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
}

impl JobPoller {
    pub fn new(source: Arc<dyn StatusSource>, config: PollerConfig) -> Self {
        Self { source, config }
    }

    /// Start polling `id`, reporting to `observer`.
    pub fn spawn<O: PollObserver>(&self, id: JobId, observer: O) -> PollHandle {
        let token = CancellationToken::new();
        let gate = Gate::default();
        let task = tokio::spawn(run(
            Arc::clone(&self.source),
            id,
            observer,
            self.config.clone(),
            token.clone(),
            Arc::clone(&gate),
        ));

        PollHandle {
            cancel: CancelOnDrop { token, gate },
            task,
        }
    }
}

async fn run<O: PollObserver>(
    source: Arc<dyn StatusSource>,
    id: JobId,
    mut observer: O,
    config: PollerConfig,
    token: CancellationToken,
    gate: Gate,
) -> PollOutcome {
    let period = config.interval.max(MIN_POLL_INTERVAL);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_errors: u32 = 0;

    tracing::debug!(job_id = %id, interval_ms = period.as_millis() as u64, "Polling started");

    loop {
        // The first tick completes immediately.
        tokio::select! {
            biased;
            _ = token.cancelled() => return PollOutcome::Cancelled,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return PollOutcome::Cancelled,
            result = source.fetch(&id) => result,
        };

        let finished = {
            let _gate = enter(&gate);
            if token.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            observe(&id, &mut observer, result, &mut consecutive_errors, &config)
        };

        if let Some(outcome) = finished {
            return outcome;
        }
    }
}

/// Report one fetch result. Returns the outcome once polling should stop.
fn observe<O: PollObserver>(
    id: &JobId,
    observer: &mut O,
    result: Result<JobProgress, PollError>,
    consecutive_errors: &mut u32,
    config: &PollerConfig,
) -> Option<PollOutcome> {
    let progress = match result {
        Ok(progress) => progress,
        Err(e) => {
            *consecutive_errors += 1;
            observer.on_error(&e);

            match e {
                PollError::NotFound(_) => {
                    tracing::warn!(job_id = %id, "Job not found, stopping");
                    return Some(PollOutcome::NotFound);
                }
                PollError::Api { status, message } if !PollError::is_retryable_status(status) => {
                    tracing::warn!(job_id = %id, status, error = %message, "Request rejected, stopping");
                    return Some(PollOutcome::Rejected { status, message });
                }
                e => {
                    tracing::warn!(
                        job_id = %id,
                        error = %e,
                        consecutive_errors = *consecutive_errors,
                        "Status fetch failed",
                    );
                }
            }

            if config
                .max_consecutive_errors
                .is_some_and(|max| *consecutive_errors >= max)
            {
                tracing::error!(job_id = %id, consecutive_errors = *consecutive_errors, "Giving up on job");
                return Some(PollOutcome::GaveUp {
                    consecutive_errors: *consecutive_errors,
                });
            }
            return None;
        }
    };

    *consecutive_errors = 0;
    match progress.status {
        JobStatus::Completed => {
            tracing::info!(job_id = %id, "Job completed");
            observer.on_complete(&progress);
            Some(PollOutcome::Completed(progress))
        }
        JobStatus::Failed => {
            tracing::warn!(
                job_id = %id,
                error = progress.error_message.as_deref().unwrap_or(""),
                "Job failed",
            );
            observer.on_failed(&progress);
            Some(PollOutcome::Failed(progress))
        }
        JobStatus::Pending | JobStatus::Processing => {
            observer.on_progress(&progress);
            None
        }
    }
}
