//! `vidgen-watch` -- submit a prompt and follow the job to completion.
//!
//! ```text
//! vidgen-watch a cat on a skateboard
//! vidgen-watch --id video_0f3c...
//! ```
//!
//! # Environment variables
//!
//! | Variable           | Required | Default                 | Description                        |
//! |--------------------|----------|-------------------------|------------------------------------|
//! | `VIDGEN_API_URL`   | no       | `http://localhost:3000` | Job service base URL               |
//! | `POLL_INTERVAL_MS` | no       | `1000`                  | Milliseconds between status polls  |
//! | `POLL_MAX_ERRORS`  | no       | unset                   | Give up after N failed polls in a row |

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidgen_core::job::{GenerationRequest, JobProgress};
use vidgen_core::types::JobId;
use vidgen_poller::client::DEFAULT_SERVICE_URL;
use vidgen_poller::{JobPoller, JobServiceClient, PollError, PollObserver, PollOutcome, PollerConfig};

/// Default interval between status polls.
const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Logs every observation.
struct LogObserver;

impl PollObserver for LogObserver {
    fn on_progress(&mut self, progress: &JobProgress) {
        tracing::info!(
            status = %progress.status,
            progress = progress.progress,
            step = %progress.current_step,
            eta_secs = progress.estimated_time_remaining,
            "Progress",
        );
    }

    fn on_complete(&mut self, progress: &JobProgress) {
        tracing::info!(job_id = %progress.id, "Video ready");
    }

    fn on_failed(&mut self, progress: &JobProgress) {
        tracing::error!(
            job_id = %progress.id,
            error = progress.error_message.as_deref().unwrap_or("unknown error"),
            "Generation failed",
        );
    }

    fn on_error(&mut self, error: &PollError) {
        tracing::warn!(error = %error, retryable = error.is_retryable(), "Status check failed");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidgen_poller=info,vidgen_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_url = std::env::var("VIDGEN_API_URL").unwrap_or_else(|_| DEFAULT_SERVICE_URL.into());

    let interval_ms = match env_number::<u64>("POLL_INTERVAL_MS") {
        Ok(None) => DEFAULT_INTERVAL_MS,
        Ok(Some(ms)) if ms > 0 => ms,
        Ok(Some(_)) | Err(_) => {
            tracing::error!("POLL_INTERVAL_MS must be a positive integer");
            return ExitCode::from(2);
        }
    };

    let max_consecutive_errors = match env_number::<u32>("POLL_MAX_ERRORS") {
        Ok(max) => max,
        Err(raw) => {
            tracing::error!(value = %raw, "POLL_MAX_ERRORS must be a non-negative integer");
            return ExitCode::from(2);
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        tracing::error!("Usage: vidgen-watch <prompt...> | vidgen-watch --id <job-id>");
        return ExitCode::from(2);
    }

    let client = JobServiceClient::new(&base_url);

    let job_id = match args.as_slice() {
        [flag, id] if flag == "--id" => JobId::from(id.as_str()),
        _ => {
            let request = GenerationRequest::new(args.join(" "));
            match client.submit(&request).await {
                Ok(job) => job.id().clone(),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to submit generation");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    tracing::info!(job_id = %job_id, base_url = %base_url, interval_ms, "Watching job");

    let poller = JobPoller::new(
        Arc::new(client),
        PollerConfig {
            interval: Duration::from_millis(interval_ms),
            max_consecutive_errors,
        },
    );
    let handle = poller.spawn(job_id, LogObserver);

    let outcome = tokio::select! {
        outcome = handle.join() => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping");
            PollOutcome::Cancelled
        }
    };

    match outcome {
        PollOutcome::Completed(_) => ExitCode::SUCCESS,
        PollOutcome::NotFound => {
            tracing::error!("No such job on the service");
            ExitCode::FAILURE
        }
        PollOutcome::Rejected { status, message } => {
            tracing::error!(status, error = %message, "Service rejected the status request");
            ExitCode::FAILURE
        }
        PollOutcome::GaveUp { consecutive_errors } => {
            tracing::error!(consecutive_errors, "Service unreachable, giving up");
            ExitCode::FAILURE
        }
        PollOutcome::Failed(_) | PollOutcome::Cancelled => ExitCode::FAILURE,
    }
}

/// Read an optional numeric env var. Blank counts as unset; an unparsable
/// value is returned as the error.
fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(|_| raw),
        _ => Ok(None),
    }
}
