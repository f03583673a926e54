//! Provider abstraction consumed by the upstream-proxied progress driver.

use async_trait::async_trait;
use vidgen_core::job::GenerationParams;

use crate::api::ProviderApi;
use crate::error::ProviderError;
use crate::models::{ProviderJob, ProviderProgress};

/// An external video-generation provider.
///
/// Implemented by [`ProviderApi`] for the real HTTP service; tests supply
/// in-memory fakes.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn create_job(&self, params: &GenerationParams) -> Result<ProviderJob, ProviderError>;

    async fn get_job(&self, id: &str) -> Result<ProviderJob, ProviderError>;

    async fn get_progress(&self, id: &str) -> Result<ProviderProgress, ProviderError>;

    async fn download_url(&self, id: &str) -> Result<String, ProviderError>;

    /// Whether the provider can enumerate jobs. The HTTP provider cannot.
    fn supports_listing(&self) -> bool {
        false
    }
}

#[async_trait]
impl VideoProvider for ProviderApi {
    async fn create_job(&self, params: &GenerationParams) -> Result<ProviderJob, ProviderError> {
        self.create_video(params).await
    }

    async fn get_job(&self, id: &str) -> Result<ProviderJob, ProviderError> {
        self.get_video(id).await
    }

    async fn get_progress(&self, id: &str) -> Result<ProviderProgress, ProviderError> {
        ProviderApi::get_progress(self, id).await
    }

    async fn download_url(&self, id: &str) -> Result<String, ProviderError> {
        self.get_download_url(id).await
    }
}
