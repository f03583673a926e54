//! Integration tests for [`JobPoller`] against scripted status sources.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use vidgen_core::job::JobProgress;
use vidgen_core::status::JobStatus;
use vidgen_core::types::JobId;
use vidgen_poller::{JobPoller, PollError, PollObserver, PollOutcome, PollerConfig, StatusSource};

const INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Progress(u8),
    Complete,
    Failed(Option<String>),
    Error,
}

/// Records every callback.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

impl PollObserver for Recorder {
    fn on_progress(&mut self, progress: &JobProgress) {
        self.0.lock().unwrap().push(Event::Progress(progress.progress));
    }

    fn on_complete(&mut self, _progress: &JobProgress) {
        self.0.lock().unwrap().push(Event::Complete);
    }

    fn on_failed(&mut self, progress: &JobProgress) {
        self.0
            .lock()
            .unwrap()
            .push(Event::Failed(progress.error_message.clone()));
    }

    fn on_error(&mut self, _error: &PollError) {
        self.0.lock().unwrap().push(Event::Error);
    }
}

/// One scripted fetch result.
#[derive(Clone)]
enum Step {
    At(JobStatus, u8),
    FailedWith(&'static str),
    Unreachable,
    Missing,
    Refused(u16),
}

/// Replays a script; the last step repeats. Counts fetches.
struct Scripted {
    steps: Mutex<VecDeque<Step>>,
    fetches: AtomicUsize,
}

impl Scripted {
    fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for Scripted {
    async fn fetch(&self, id: &JobId) -> Result<JobProgress, PollError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap()
            }
        };

        let snapshot = |status, progress, error_message| JobProgress {
            id: id.clone(),
            progress,
            status,
            current_step: String::new(),
            estimated_time_remaining: None,
            error_message,
        };

        match step {
            Step::At(status, progress) => Ok(snapshot(status, progress, None)),
            Step::FailedWith(message) => {
                Ok(snapshot(JobStatus::Failed, 0, Some(message.to_string())))
            }
            Step::Unreachable => Err(PollError::Api {
                status: 503,
                message: "unavailable".into(),
            }),
            Step::Missing => Err(PollError::NotFound(id.to_string())),
            Step::Refused(status) => Err(PollError::Api {
                status,
                message: "Video ID is required".into(),
            }),
        }
    }
}

fn poller(source: Arc<Scripted>, max_consecutive_errors: Option<u32>) -> JobPoller {
    JobPoller::new(
        source,
        PollerConfig {
            interval: INTERVAL,
            max_consecutive_errors,
        },
    )
}

// ---------------------------------------------------------------------------
// Test: first fetch is immediate
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn first_fetch_happens_immediately() {
    let source = Scripted::new([Step::At(JobStatus::Processing, 10)]);
    let recorder = Recorder::default();
    let handle = poller(Arc::clone(&source), None).spawn(JobId::from("j"), recorder.clone());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(source.fetches(), 1);
    assert_eq!(recorder.events(), vec![Event::Progress(10)]);
    handle.cancel();
}

// ---------------------------------------------------------------------------
// Test: completion is reported exactly once
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn completion_fires_exactly_once() {
    let source = Scripted::new([
        Step::At(JobStatus::Pending, 0),
        Step::At(JobStatus::Processing, 50),
        Step::At(JobStatus::Completed, 100),
    ]);
    let recorder = Recorder::default();
    let handle = poller(Arc::clone(&source), None).spawn(JobId::from("j"), recorder.clone());

    let outcome = handle.join().await;

    assert_matches!(outcome, PollOutcome::Completed(ref p) if p.progress == 100);
    assert_eq!(
        recorder.events(),
        vec![Event::Progress(0), Event::Progress(50), Event::Complete]
    );

    // The source keeps answering `completed`; nothing polls it any more.
    let fetches = source.fetches();
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(source.fetches(), fetches);
    assert_eq!(
        recorder
            .events()
            .iter()
            .filter(|e| **e == Event::Complete)
            .count(),
        1
    );
}

// ---------------------------------------------------------------------------
// Test: failed is terminal
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_status_stops_polling() {
    let source = Scripted::new([
        Step::At(JobStatus::Processing, 30),
        Step::FailedWith("renderer crashed"),
    ]);
    let recorder = Recorder::default();

    let outcome = poller(Arc::clone(&source), None)
        .spawn(JobId::from("j"), recorder.clone())
        .join()
        .await;

    assert_matches!(outcome, PollOutcome::Failed(_));
    assert_eq!(
        recorder.events(),
        vec![
            Event::Progress(30),
            Event::Failed(Some("renderer crashed".into()))
        ]
    );
    assert_eq!(source.fetches(), 2);
}

// ---------------------------------------------------------------------------
// Test: transient errors
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn transient_errors_are_reported_and_polling_continues() {
    let source = Scripted::new([
        Step::Unreachable,
        Step::Unreachable,
        Step::At(JobStatus::Processing, 60),
        Step::At(JobStatus::Completed, 100),
    ]);
    let recorder = Recorder::default();

    let outcome = poller(Arc::clone(&source), Some(3))
        .spawn(JobId::from("j"), recorder.clone())
        .join()
        .await;

    assert_matches!(outcome, PollOutcome::Completed(_));
    assert_eq!(
        recorder.events(),
        vec![Event::Error, Event::Error, Event::Progress(60), Event::Complete]
    );
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_consecutive_errors() {
    let source = Scripted::new([Step::Unreachable]);
    let recorder = Recorder::default();

    let outcome = poller(Arc::clone(&source), Some(3))
        .spawn(JobId::from("j"), recorder.clone())
        .join()
        .await;

    assert_eq!(outcome, PollOutcome::GaveUp { consecutive_errors: 3 });
    assert_eq!(recorder.events(), vec![Event::Error; 3]);
}

// ---------------------------------------------------------------------------
// Test: no callbacks after teardown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancelled_poller_fires_no_more_callbacks() {
    let source = Scripted::new([Step::At(JobStatus::Processing, 10)]);
    let recorder = Recorder::default();
    let handle = poller(Arc::clone(&source), None).spawn(JobId::from("j"), recorder.clone());

    tokio::time::sleep(INTERVAL / 2).await;
    handle.cancel();
    let before = recorder.events().len();
    let fetches = source.fetches();

    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(recorder.events().len(), before);
    assert_eq!(source.fetches(), fetches);
    assert_eq!(handle.join().await, PollOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_polling() {
    let source = Scripted::new([Step::At(JobStatus::Processing, 10)]);
    let recorder = Recorder::default();
    let handle = poller(Arc::clone(&source), None).spawn(JobId::from("j"), recorder.clone());

    tokio::time::sleep(INTERVAL / 2).await;
    drop(handle);
    let before = recorder.events().len();

    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(recorder.events().len(), before);
}

// ---------------------------------------------------------------------------
// Test: non-retryable errors end polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unknown_job_stops_polling_without_error_budget() {
    let source = Scripted::new([Step::Missing]);
    let recorder = Recorder::default();

    let outcome = poller(Arc::clone(&source), None)
        .spawn(JobId::from("video_typo"), recorder.clone())
        .join()
        .await;

    assert_eq!(outcome, PollOutcome::NotFound);
    assert_eq!(recorder.events(), vec![Event::Error]);

    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn client_error_status_is_not_retried() {
    let source = Scripted::new([Step::Unreachable, Step::Refused(400)]);
    let recorder = Recorder::default();

    let outcome = poller(Arc::clone(&source), None)
        .spawn(JobId::from("j"), recorder.clone())
        .join()
        .await;

    assert_matches!(outcome, PollOutcome::Rejected { status: 400, .. });
    assert_eq!(recorder.events(), vec![Event::Error, Event::Error]);
    assert_eq!(source.fetches(), 2);
}

// ---------------------------------------------------------------------------
// Test: zero interval
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn zero_interval_is_clamped_instead_of_panicking() {
    let source = Scripted::new([
        Step::At(JobStatus::Processing, 20),
        Step::At(JobStatus::Completed, 100),
    ]);
    let poller = JobPoller::new(
        Arc::clone(&source) as Arc<dyn StatusSource>,
        PollerConfig {
            interval: Duration::ZERO,
            max_consecutive_errors: None,
        },
    );

    let outcome = poller.spawn(JobId::from("j"), Recorder::default()).join().await;

    assert_matches!(outcome, PollOutcome::Completed(_));
}

// ---------------------------------------------------------------------------
// Test: cancel waits for an in-flight callback
// ---------------------------------------------------------------------------

/// Observer whose progress callback blocks for a while.
#[derive(Clone, Default)]
struct Slow(Arc<AtomicUsize>);

impl PollObserver for Slow {
    fn on_progress(&mut self, _progress: &JobProgress) {
        std::thread::sleep(Duration::from_millis(5));
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&mut self, _progress: &JobProgress) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_callback_runs_after_cancel_returns() {
    let source = Scripted::new([Step::At(JobStatus::Processing, 10)]);
    let poller = JobPoller::new(
        Arc::clone(&source) as Arc<dyn StatusSource>,
        PollerConfig {
            interval: Duration::from_millis(1),
            max_consecutive_errors: None,
        },
    );

    for _ in 0..10 {
        let calls = Slow::default();
        let handle = poller.spawn(JobId::from("j"), calls.clone());

        tokio::time::sleep(Duration::from_millis(12)).await;
        handle.cancel();
        let seen = calls.0.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.0.load(Ordering::SeqCst), seen);
        assert_eq!(handle.join().await, PollOutcome::Cancelled);
    }
}
