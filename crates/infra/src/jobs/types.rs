//! Policies and views shared by the job components.

use std::time::Duration;

use serde::Serialize;

use bulksend_core::{EmailJob, JobId, JobProgress, JobStatus, RecipientOutcome};

/// How long finished jobs are kept in memory.
///
/// Only completed jobs are ever evicted; pending and processing jobs stay
/// until they finish, even if that exceeds `max_jobs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Upper bound on stored jobs; oldest completed jobs go first.
    pub max_jobs: Option<usize>,
    /// Completed jobs older than this (by `completed_at`) are dropped.
    pub ttl: Option<Duration>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_jobs: Some(1000),
            ttl: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

impl RetentionPolicy {
    /// Keep everything for the lifetime of the process.
    pub fn unbounded() -> Self {
        Self {
            max_jobs: None,
            ttl: None,
        }
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = Some(max_jobs);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Per-recipient send limit; the transport's own timeout applies when `None`.
    pub send_timeout: Option<Duration>,
}

/// Snapshot served to status pollers. Built from one read of the job so
/// progress and results always agree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub results: Vec<RecipientOutcome>,
}

impl From<&EmailJob> for JobStatusView {
    fn from(job: &EmailJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress(),
            results: job.outcomes(),
        }
    }
}
