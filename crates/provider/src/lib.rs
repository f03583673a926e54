//! Video-generation provider client.
//!
//! Provides the typed REST client for the upstream provider, its wire
//! models and error mapping, and the [`VideoProvider`] trait the
//! progress driver is written against.

pub mod api;
pub mod error;
pub mod models;
pub mod provider;

pub use api::{ProviderApi, ProviderConfig};
pub use error::ProviderError;
pub use provider::VideoProvider;
