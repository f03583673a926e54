//! Video generation job service library.
//!
//! Exposes the building blocks (config, store, engine, error handling,
//! routes) so integration tests and the binary entrypoint can both use
//! them.

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod store;
