//! `vidgen-poller` library crate.
//!
//! Client side of the job protocol: an HTTP client for the job service and
//! a cancellable poller that follows one job to a terminal state. The
//! `vidgen-watch` binary entrypoint lives in `main.rs`.

pub mod client;
pub mod error;
pub mod poller;

pub use client::JobServiceClient;
pub use error::PollError;
pub use poller::{JobPoller, PollHandle, PollObserver, PollOutcome, PollerConfig, StatusSource};
