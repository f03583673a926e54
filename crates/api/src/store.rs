//! In-memory job store.
//!
//! The only shared mutable resource in the service. Every mutation runs
//! under a single write-lock acquisition and no lock is ever held across
//! I/O, so a driver can never write back a stale copy of a job.

use std::collections::HashMap;

use tokio::sync::RwLock;
use vidgen_core::job::{Job, JobUpdate, TransitionError};
use vidgen_core::types::{JobId, Timestamp};

/// Errors from [`JobStore::apply`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("update rejected for job {id}: {source}")]
    Rejected {
        id: JobId,
        #[source]
        source: TransitionError,
    },
}

/// Keyed record of generation jobs.
///
/// Create/read/update by id only; removal is reserved for the retention
/// sweeper via [`JobStore::evict`].
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job. Returns `false` (and leaves the existing record
    /// untouched) if the id is already taken.
    pub async fn insert(&self, job: Job) -> bool {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job.id()) {
            return false;
        }
        jobs.insert(job.id().clone(), job);
        true
    }

    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Return the job for `id`, creating it with `make` if absent.
    ///
    /// The check and the insert happen under one lock, so concurrent
    /// callers for the same id observe exactly one `created == true`.
    pub async fn get_or_insert_with(&self, id: &JobId, make: impl FnOnce() -> Job) -> (Job, bool) {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(id) {
            return (existing.clone(), false);
        }
        let job = make();
        jobs.insert(id.clone(), job.clone());
        (job, true)
    }

    /// Apply an update to the current state of a job and return the result.
    pub async fn apply(&self, id: &JobId, update: JobUpdate) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        job.apply(update).map_err(|source| StoreError::Rejected {
            id: id.clone(),
            source,
        })?;
        Ok(job.clone())
    }

    /// All jobs, newest first by `created_at`.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(a.id()))
        });
        jobs
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Remove terminal jobs last updated before `cutoff`, then, while more
    /// than `max_jobs` remain, the least recently updated terminal jobs.
    ///
    /// Active jobs are never removed. Returns the number of jobs evicted.
    pub async fn evict(&self, cutoff: Timestamp, max_jobs: usize) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();

        jobs.retain(|_, job| !(job.is_terminal() && job.updated_at() < cutoff));

        if jobs.len() > max_jobs {
            let mut terminal: Vec<(Timestamp, JobId)> = jobs
                .values()
                .filter(|job| job.is_terminal())
                .map(|job| (job.updated_at(), job.id().clone()))
                .collect();
            terminal.sort();

            let excess = jobs.len() - max_jobs;
            for (_, id) in terminal.into_iter().take(excess) {
                jobs.remove(&id);
            }
        }

        before - jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use vidgen_core::job::GenerationParams;
    use vidgen_core::status::JobStatus;

    use super::*;

    fn job(id: &str) -> Job {
        Job::new(JobId::from(id), GenerationParams::unspecified())
    }

    fn complete() -> JobUpdate {
        JobUpdate::Complete {
            result_location: "r.mp4".into(),
            thumbnail_location: None,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = JobStore::new();
        assert!(store.insert(job("a")).await);
        assert!(!store.insert(job("a")).await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_get_or_insert_creates_once() {
        let store = Arc::new(JobStore::new());
        let id = JobId::from("lazy");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                tokio::spawn(async move {
                    store
                        .get_or_insert_with(&id, || job("lazy"))
                        .await
                        .1
                })
            })
            .collect();

        let mut created = 0;
        for h in handles {
            if h.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn apply_reports_missing_and_rejected() {
        let store = JobStore::new();
        assert_matches!(
            store.apply(&JobId::from("nope"), complete()).await,
            Err(StoreError::NotFound(_))
        );

        store.insert(job("a")).await;
        let updated = store.apply(&JobId::from("a"), complete()).await.unwrap();
        assert_eq!(updated.status(), JobStatus::Completed);

        assert_matches!(
            store.apply(&JobId::from("a"), complete()).await,
            Err(StoreError::Rejected {
                source: TransitionError::AlreadyTerminal(JobStatus::Completed),
                ..
            })
        );
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = JobStore::new();
        store.insert(job("first")).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.insert(job("second")).await;

        let ids: Vec<String> = store
            .list()
            .await
            .iter()
            .map(|j| j.id().to_string())
            .collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn evict_removes_only_old_terminal_jobs() {
        let store = JobStore::new();
        store.insert(job("done")).await;
        store.insert(job("running")).await;
        store.apply(&JobId::from("done"), complete()).await.unwrap();

        let future_cutoff = chrono::Utc::now() + chrono::Duration::hours(1);
        let evicted = store.evict(future_cutoff, usize::MAX).await;

        assert_eq!(evicted, 1);
        assert!(store.get(&JobId::from("done")).await.is_none());
        assert!(store.get(&JobId::from("running")).await.is_some());
    }

    #[tokio::test]
    async fn evict_trims_least_recently_updated_terminal_jobs_over_capacity() {
        let store = JobStore::new();
        for id in ["a", "b", "c"] {
            store.insert(job(id)).await;
        }
        store.insert(job("active")).await;
        for id in ["a", "b", "c"] {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            store.apply(&JobId::from(id), complete()).await.unwrap();
        }

        let past_cutoff = chrono::Utc::now() - chrono::Duration::hours(1);
        let evicted = store.evict(past_cutoff, 2).await;

        assert_eq!(evicted, 2);
        assert!(store.get(&JobId::from("a")).await.is_none());
        assert!(store.get(&JobId::from("b")).await.is_none());
        assert!(store.get(&JobId::from("c")).await.is_some());
        assert!(store.get(&JobId::from("active")).await.is_some());
    }
}
