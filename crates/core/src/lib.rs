//! Domain types for video generation jobs: the job record and its state
//! machine, request validation, progress checkpoints and the shared error
//! type.

pub mod error;
pub mod job;
pub mod progress;
pub mod status;
pub mod types;
