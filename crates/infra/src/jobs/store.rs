//! Job storage implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use bulksend_core::{DomainError, DomainResult, EmailJob, JobId, JobSummary};

use super::types::RetentionPolicy;

/// A state transition applied to one job under the store's write lock.
pub type JobMutation = Box<dyn FnOnce(&mut EmailJob) -> DomainResult<()> + Send>;

/// Job store abstraction.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job.
    async fn insert(&self, job: EmailJob) -> Result<JobId, JobStoreError>;

    /// Snapshot of a job by ID.
    async fn get(&self, job_id: JobId) -> Option<EmailJob>;

    /// Apply `mutation` while holding exclusive access to the job, so readers
    /// see the job either before or after it. Mutations are expected to check
    /// their preconditions before changing anything.
    async fn update(&self, job_id: JobId, mutation: JobMutation) -> Result<(), JobStoreError>;

    /// Whether cancellation was requested for the job.
    async fn cancel_requested(&self, job_id: JobId) -> bool;

    /// Summaries of all jobs, newest first.
    async fn list(&self) -> Vec<JobSummary>;

    /// Apply the retention policy. Returns the number of evicted jobs.
    async fn prune(&self, now: DateTime<Utc>) -> usize;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Process-memory job store.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, EmailJob>>,
    retention: RetentionPolicy,
}

impl InMemoryJobStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn arc(retention: RetentionPolicy) -> Arc<Self> {
        Arc::new(Self::new(retention))
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

/// Evict expired completed jobs, then the oldest completed ones until there
/// is room for `incoming` more.
fn prune_locked(
    jobs: &mut HashMap<JobId, EmailJob>,
    retention: &RetentionPolicy,
    now: DateTime<Utc>,
    incoming: usize,
) -> usize {
    let before = jobs.len();

    if let Some(ttl) = retention.ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()) {
        jobs.retain(|_, job| match job.completed_at {
            Some(done) if job.is_terminal() => now - done < ttl,
            _ => true,
        });
    }

    if let Some(max) = retention.max_jobs {
        let target = max.saturating_sub(incoming);
        if jobs.len() > target {
            let mut completed: Vec<(DateTime<Utc>, JobId)> = jobs
                .values()
                .filter(|j| j.is_terminal())
                .map(|j| (j.completed_at.unwrap_or(j.created_at), j.id))
                .collect();
            completed.sort();

            let excess = jobs.len() - target;
            for (_, id) in completed.into_iter().take(excess) {
                jobs.remove(&id);
            }

            if jobs.len() > target {
                warn!(
                    stored = jobs.len(),
                    max_jobs = max,
                    "job retention limit exceeded by active jobs"
                );
            }
        }
    }

    let evicted = before - jobs.len();
    if evicted > 0 {
        debug!(evicted, "evicted completed jobs");
    }
    evicted
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: EmailJob) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        prune_locked(&mut jobs, &self.retention, Utc::now(), 1);

        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn get(&self, job_id: JobId) -> Option<EmailJob> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    async fn update(&self, job_id: JobId, mutation: JobMutation) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
        mutation(job)?;
        Ok(())
    }

    async fn cancel_requested(&self, job_id: JobId) -> bool {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .is_some_and(|j| j.cancel_requested)
    }

    async fn list(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut result: Vec<_> = jobs.values().map(EmailJob::summary).collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        result
    }

    async fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        prune_locked(&mut jobs, &self.retention, now, 0)
    }
}
