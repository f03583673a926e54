//! Generation orchestrator.
//!
//! Entry point for every job operation exposed over HTTP. Validates input,
//! creates jobs, starts their progress drivers, and answers lookups
//! according to the configured [`LookupPolicy`]. In upstream mode lookups
//! of live jobs read through to the provider.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vidgen_core::error::CoreError;
use vidgen_core::job::{GenerationParams, GenerationRequest, Job, JobProgress, JobUpdate};
use vidgen_core::types::JobId;
use vidgen_provider::{ProviderError, VideoProvider};

use crate::config::{EngineConfig, LookupPolicy, ProgressMode};
use crate::engine::driver::DriverRegistry;
use crate::engine::source::{
    update_from_provider_job, update_from_provider_progress, ProgressSource, SimulatedSource,
    UpstreamSource,
};
use crate::store::{JobStore, StoreError};

/// Note attached to listings the provider cannot serve.
pub const LISTING_UNSUPPORTED_NOTE: &str =
    "The upstream provider does not support listing jobs; query jobs individually by id";

/// Where progress comes from.
pub enum ProgressBackend {
    Simulated {
        step: Duration,
        asset_base_url: String,
    },
    Upstream {
        provider: Arc<dyn VideoProvider>,
        poll_interval: Duration,
    },
}

impl ProgressBackend {
    /// Build the backend for `config`. `provider` is only used in
    /// upstream mode.
    pub fn from_config(config: &EngineConfig, provider: Arc<dyn VideoProvider>) -> Self {
        match config.mode {
            ProgressMode::Simulated => ProgressBackend::Simulated {
                step: config.simulation_step,
                asset_base_url: config.simulated_asset_base_url.clone(),
            },
            ProgressMode::Upstream => ProgressBackend::Upstream {
                provider,
                poll_interval: config.upstream_poll_interval,
            },
        }
    }

    pub fn mode(&self) -> ProgressMode {
        match self {
            ProgressBackend::Simulated { .. } => ProgressMode::Simulated,
            ProgressBackend::Upstream { .. } => ProgressMode::Upstream,
        }
    }
}

/// Result of a list request.
#[derive(Debug)]
pub struct JobListing {
    pub jobs: Vec<Job>,
    /// Explains an empty listing the backend cannot fill.
    pub note: Option<String>,
}

/// Which provider endpoint a read-through lookup uses.
#[derive(Clone, Copy)]
enum Refresh {
    Job,
    Progress,
}

pub struct Orchestrator {
    store: Arc<JobStore>,
    drivers: DriverRegistry,
    backend: ProgressBackend,
    lookup: LookupPolicy,
}

impl Orchestrator {
    pub fn new(
        store: Arc<JobStore>,
        backend: ProgressBackend,
        lookup: LookupPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            drivers: DriverRegistry::new(cancel),
            backend,
            lookup,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn mode(&self) -> ProgressMode {
        self.backend.mode()
    }

    pub fn lookup_policy(&self) -> LookupPolicy {
        self.lookup
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    // -----------------------------------------------------------------------
    // Submit
    // -----------------------------------------------------------------------

    /// Validate `request`, create a job and start driving it.
    ///
    /// Nothing is stored when validation or provider creation fails.
    pub async fn submit(&self, request: GenerationRequest) -> Result<Job, CoreError> {
        let params = request.validate()?;

        let (job, initial) = match &self.backend {
            ProgressBackend::Simulated { .. } => (Job::new(JobId::generate(), params), None),
            ProgressBackend::Upstream { provider, .. } => {
                let remote = provider.create_job(&params).await?;
                let id = JobId::from(remote.id.clone());
                let initial = update_from_provider_job(&id, &remote);
                (Job::new(id, params), Some(initial))
            }
        };

        let id = job.id().clone();
        if !self.store.insert(job).await {
            return Err(CoreError::Internal(format!("duplicate job id {id}")));
        }

        let job = match initial {
            Some(update) => self.apply_snapshot(&id, update).await?,
            None => self.current(&id).await?,
        };

        tracing::info!(
            job_id = %id,
            mode = self.mode().as_str(),
            prompt_len = job.request().prompt.len(),
            "Generation job submitted",
        );

        if !job.is_terminal() {
            self.start_driver(&id).await;
        }
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Full job record.
    pub async fn get(&self, id: &JobId) -> Result<Job, CoreError> {
        self.lookup(id, Refresh::Job).await
    }

    /// Progress projection of a job.
    pub async fn progress(&self, id: &JobId) -> Result<JobProgress, CoreError> {
        Ok(self.lookup(id, Refresh::Progress).await?.progress_view())
    }

    /// All jobs known to the service, newest first.
    pub async fn list(&self) -> JobListing {
        match &self.backend {
            ProgressBackend::Upstream { provider, .. } if !provider.supports_listing() => {
                JobListing {
                    jobs: Vec::new(),
                    note: Some(LISTING_UNSUPPORTED_NOTE.to_string()),
                }
            }
            _ => JobListing {
                jobs: self.store.list().await,
                note: None,
            },
        }
    }

    /// Location of the finished video for `id`.
    pub async fn download_location(&self, id: &JobId) -> Result<String, CoreError> {
        match &self.backend {
            ProgressBackend::Simulated { .. } => {
                let job = self
                    .store
                    .get(id)
                    .await
                    .ok_or_else(|| CoreError::job_not_found(id.as_str()))?;
                job.result_location()
                    .map(str::to_string)
                    .ok_or_else(|| CoreError::NotFound {
                        entity: "Video",
                        id: id.to_string(),
                    })
            }
            ProgressBackend::Upstream { provider, .. } => provider
                .download_url(id.as_str())
                .await
                .map_err(|e| match e {
                    ProviderError::NotFound(id) => CoreError::NotFound { entity: "Video", id },
                    other => other.into(),
                }),
        }
    }

    /// Cancel all drivers and wait for them to record the interruption.
    pub async fn shutdown(&self, timeout: Duration) {
        self.drivers.shutdown(timeout).await;
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn lookup(&self, id: &JobId, refresh: Refresh) -> Result<Job, CoreError> {
        if let Some(job) = self.store.get(id).await {
            return match &self.backend {
                ProgressBackend::Upstream { provider, .. } if !job.is_terminal() => {
                    self.refresh(provider.as_ref(), id, refresh).await
                }
                _ => Ok(job),
            };
        }

        match (&self.backend, self.lookup) {
            (_, LookupPolicy::Lenient) => Ok(self.create_on_lookup(id, None).await),
            (ProgressBackend::Simulated { .. }, LookupPolicy::Strict) => {
                Err(CoreError::job_not_found(id.as_str()))
            }
            (ProgressBackend::Upstream { provider, .. }, LookupPolicy::Strict) => {
                // The provider may know a job this process never saw.
                let remote = provider.get_job(id.as_str()).await?;
                tracing::info!(job_id = %id, "Adopted job from provider");
                let update = update_from_provider_job(id, &remote);
                Ok(self.create_on_lookup(id, Some(update)).await)
            }
        }
    }

    /// Insert a placeholder job for `id` if absent and start its driver.
    async fn create_on_lookup(&self, id: &JobId, initial: Option<JobUpdate>) -> Job {
        let (job, created) = self
            .store
            .get_or_insert_with(id, || {
                Job::new(id.clone(), GenerationParams::unspecified())
            })
            .await;
        if !created {
            return job;
        }

        tracing::info!(job_id = %id, "Job created on first lookup");
        let job = match initial {
            Some(update) => self.apply_snapshot(id, update).await.unwrap_or(job),
            None => job,
        };
        if !job.is_terminal() {
            self.start_driver(id).await;
        }
        job
    }

    /// Read-through refresh of a live upstream job.
    ///
    /// Provider errors are returned to the caller without touching the
    /// job; the driver decides whether they are fatal.
    async fn refresh(
        &self,
        provider: &dyn VideoProvider,
        id: &JobId,
        refresh: Refresh,
    ) -> Result<Job, CoreError> {
        let update = match refresh {
            Refresh::Job => update_from_provider_job(id, &provider.get_job(id.as_str()).await?),
            Refresh::Progress => {
                match update_from_provider_progress(&provider.get_progress(id.as_str()).await?) {
                    Some(update) => update,
                    None => update_from_provider_job(id, &provider.get_job(id.as_str()).await?),
                }
            }
        };
        self.apply_snapshot(id, update).await
    }

    /// Apply a provider snapshot, tolerating stale or duplicate updates.
    async fn apply_snapshot(&self, id: &JobId, update: JobUpdate) -> Result<Job, CoreError> {
        match self.store.apply(id, update).await {
            Ok(job) => Ok(job),
            Err(StoreError::Rejected { .. }) => self.current(id).await,
            Err(StoreError::NotFound(_)) => Err(CoreError::job_not_found(id.as_str())),
        }
    }

    async fn current(&self, id: &JobId) -> Result<Job, CoreError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| CoreError::job_not_found(id.as_str()))
    }

    async fn start_driver(&self, id: &JobId) {
        let source: Box<dyn ProgressSource> = match &self.backend {
            ProgressBackend::Simulated {
                step,
                asset_base_url,
            } => Box::new(SimulatedSource::new(*step, asset_base_url.clone())),
            ProgressBackend::Upstream {
                provider,
                poll_interval,
            } => Box::new(UpstreamSource::new(Arc::clone(provider), *poll_interval)),
        };
        self.drivers
            .spawn(id.clone(), Arc::clone(&self.store), source)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use vidgen_core::status::JobStatus;

    use super::*;

    fn simulated(lookup: LookupPolicy) -> Orchestrator {
        Orchestrator::new(
            Arc::new(JobStore::new()),
            ProgressBackend::Simulated {
                step: Duration::from_millis(500),
                asset_base_url: "https://example.com/videos".into(),
            },
            lookup,
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn submit_creates_pending_job_with_defaults() {
        let orchestrator = simulated(LookupPolicy::Strict);

        let job = orchestrator
            .submit(GenerationRequest::new("  a cat on a skateboard "))
            .await
            .unwrap();

        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.progress(), 0);
        assert_eq!(job.request().prompt, "a cat on a skateboard");
        assert_eq!(job.request().duration, 10);
        assert!(job.id().as_str().starts_with("video_"));
        assert_eq!(orchestrator.drivers().active_count().await, 1);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_without_side_effects() {
        let orchestrator = simulated(LookupPolicy::Strict);

        let err = orchestrator
            .submit(GenerationRequest::new("   "))
            .await
            .unwrap_err();

        assert_matches!(err, CoreError::Validation(_));
        assert!(orchestrator.store().is_empty().await);
        assert_eq!(orchestrator.drivers().active_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_job_runs_to_completion() {
        let orchestrator = simulated(LookupPolicy::Strict);
        let job = orchestrator
            .submit(GenerationRequest::new("sunrise"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(3100)).await;

        let done = orchestrator.get(job.id()).await.unwrap();
        assert_eq!(done.status(), JobStatus::Completed);
        assert_eq!(done.progress(), 100);
        assert_eq!(
            orchestrator.download_location(job.id()).await.unwrap(),
            format!("https://example.com/videos/{}.mp4", job.id())
        );
    }

    #[tokio::test]
    async fn strict_lookup_of_unknown_id_is_not_found() {
        let orchestrator = simulated(LookupPolicy::Strict);
        let id = JobId::from("video_unknown");

        assert_matches!(
            orchestrator.get(&id).await,
            Err(CoreError::NotFound { .. })
        );
        assert!(orchestrator.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn lenient_lookup_creates_once() {
        let orchestrator = Arc::new(simulated(LookupPolicy::Lenient));
        let id = JobId::from("video_lazy");

        let (a, b) = tokio::join!(orchestrator.progress(&id), orchestrator.get(&id));

        assert_eq!(a.unwrap().status, JobStatus::Pending);
        assert_eq!(b.unwrap().status(), JobStatus::Pending);
        assert_eq!(orchestrator.store().len().await, 1);
        assert_eq!(orchestrator.drivers().active_count().await, 1);
    }

    #[tokio::test]
    async fn download_before_completion_is_not_found() {
        let orchestrator = simulated(LookupPolicy::Strict);
        let job = orchestrator
            .submit(GenerationRequest::new("sunrise"))
            .await
            .unwrap();

        assert_matches!(
            orchestrator.download_location(job.id()).await,
            Err(CoreError::NotFound { entity: "Video", .. })
        );
    }
}
