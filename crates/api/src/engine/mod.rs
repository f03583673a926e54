//! Job execution engine.
//!
//! Contains the orchestrator that owns the job lifecycle, the per-job
//! progress drivers it spawns, and the progress sources those drivers
//! read from (local simulation or the upstream provider).

pub mod driver;
pub mod orchestrator;
pub mod source;

pub use orchestrator::{JobListing, Orchestrator, ProgressBackend};
