//! Job lifecycle: create, process, query, cancel.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use bulksend_core::{
    DomainError, EmailJob, JobId, JobProgress, JobStatus, JobSummary, NewJob, Provider,
    RecipientOutcome, SmtpConfig,
};
use bulksend_mail::{DispatchFailure, Dispatcher, OutgoingEmail};

use super::store::{JobMutation, JobStore, JobStoreError};
use super::types::{JobStatusView, OrchestratorConfig};

/// Reason recorded on recipients skipped by cancellation.
const CANCELLED: &str = "job cancelled";

/// Job-level failure. Per-recipient send failures never surface here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already started: {0}")]
    AlreadyStarted(JobId),
    #[error("job processing unavailable: {0}")]
    Unavailable(String),
    #[error("job store error: {0}")]
    Store(String),
}

impl JobError {
    fn from_store(job_id: JobId, err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => JobError::NotFound(id),
            JobStoreError::Domain(DomainError::Validation(msg)) => JobError::Validation(msg),
            JobStoreError::Domain(DomainError::Conflict(_)) => JobError::AlreadyStarted(job_id),
            other => JobError::Store(other.to_string()),
        }
    }
}

/// Owns job creation and the per-job recipient loop.
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    dispatcher: Dispatcher,
    config: OrchestratorConfig,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        dispatcher: Dispatcher,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }

    /// Validate and store a new job. Nothing is sent.
    pub async fn create_job(&self, spec: NewJob) -> Result<JobId, JobError> {
        let job = EmailJob::create(spec, Utc::now()).map_err(|e| match e {
            DomainError::Validation(msg) => JobError::Validation(msg),
            other => JobError::Store(other.to_string()),
        })?;

        let (provider, total) = (job.provider, job.recipients.len());
        let job_id = self
            .store
            .insert(job)
            .await
            .map_err(|e| JobError::Store(e.to_string()))?;

        info!(job_id = %job_id, provider = %provider, recipients = total, "job created");
        Ok(job_id)
    }

    /// Run the recipient loop for `job_id` to completion.
    ///
    /// Recipients are attempted in order, one at a time. A failed send is
    /// recorded on that recipient and the loop continues. Returns the final
    /// progress.
    pub async fn process_job(&self, job_id: JobId) -> Result<JobProgress, JobError> {
        let started = Utc::now();
        self.store
            .update(job_id, Box::new(move |job| job.mark_processing(started)))
            .await
            .map_err(|e| JobError::from_store(job_id, e))?;

        let job = self
            .store
            .get(job_id)
            .await
            .ok_or(JobError::NotFound(job_id))?;

        info!(
            job_id = %job_id,
            provider = %job.provider,
            recipients = job.recipients.len(),
            "job processing started"
        );

        for (index, state) in job.recipients.iter().enumerate() {
            if self.store.cancel_requested(job_id).await {
                info!(job_id = %job_id, next_recipient = index, "job cancelled mid-run");
                break;
            }

            let email = OutgoingEmail::render(
                state.recipient(),
                &job.subject,
                &job.body,
                job.cc.as_deref(),
            );
            let result = self
                .send_one(job.provider, &email, job.smtp_config.as_ref())
                .await;

            let now = Utc::now();
            let mutation: JobMutation = match result {
                Ok(()) => {
                    debug!(job_id = %job_id, recipient_index = index, "recipient sent");
                    Box::new(move |j| j.record_sent(index, now))
                }
                Err(failure) => {
                    warn!(
                        job_id = %job_id,
                        recipient_index = index,
                        error = %failure,
                        "recipient failed"
                    );
                    let message = failure.to_string();
                    Box::new(move |j| j.record_failed(index, message))
                }
            };

            // The loop is the failure boundary: a bookkeeping error is logged,
            // never propagated.
            if let Err(e) = self.store.update(job_id, mutation).await {
                error!(
                    job_id = %job_id,
                    recipient_index = index,
                    error = %e,
                    "failed to record outcome"
                );
            }
        }

        let finished = Utc::now();
        self.store
            .update(
                job_id,
                Box::new(move |j| {
                    j.skip_remaining(CANCELLED);
                    j.mark_completed(finished)
                }),
            )
            .await
            .map_err(|e| JobError::from_store(job_id, e))?;

        let progress = self
            .store
            .get(job_id)
            .await
            .map(|j| j.progress())
            .ok_or(JobError::NotFound(job_id))?;

        info!(
            job_id = %job_id,
            sent = progress.sent,
            failed = progress.failed,
            skipped = progress.skipped,
            elapsed_ms = (finished - started).num_milliseconds().max(0),
            "job completed"
        );
        Ok(progress)
    }

    async fn send_one(
        &self,
        provider: Provider,
        email: &OutgoingEmail,
        smtp: Option<&SmtpConfig>,
    ) -> Result<(), DispatchFailure> {
        let send = self.dispatcher.dispatch(provider, email, smtp);
        match self.config.send_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .unwrap_or(Err(DispatchFailure::Timeout(limit))),
            None => send.await,
        }
    }

    pub async fn get_job(&self, job_id: JobId) -> Option<EmailJob> {
        self.store.get(job_id).await
    }

    /// Ordered per-recipient outcomes; empty for an unknown job.
    pub async fn get_job_results(&self, job_id: JobId) -> Vec<RecipientOutcome> {
        self.store
            .get(job_id)
            .await
            .map(|job| job.outcomes())
            .unwrap_or_default()
    }

    pub async fn progress(&self, job_id: JobId) -> Option<JobProgress> {
        self.store.get(job_id).await.map(|job| job.progress())
    }

    /// Status, progress and results from one consistent snapshot.
    pub async fn job_status(&self, job_id: JobId) -> Option<JobStatusView> {
        self.store.get(job_id).await.as_ref().map(JobStatusView::from)
    }

    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        self.store.list().await
    }

    /// Request cancellation.
    ///
    /// A pending job completes immediately with every recipient skipped; a
    /// processing job stops after its in-flight attempt. Returns `false` if
    /// the job had already completed.
    pub async fn cancel_job(&self, job_id: JobId) -> Result<bool, JobError> {
        let job = self
            .store
            .get(job_id)
            .await
            .ok_or(JobError::NotFound(job_id))?;
        if job.is_terminal() {
            return Ok(false);
        }

        let now = Utc::now();
        self.store
            .update(
                job_id,
                Box::new(move |j| {
                    if j.is_terminal() {
                        return Ok(());
                    }
                    j.cancel_requested = true;
                    if j.status == JobStatus::Pending {
                        j.skip_remaining(CANCELLED);
                        j.mark_completed(now)?;
                    }
                    Ok(())
                }),
            )
            .await
            .map_err(|e| JobError::from_store(job_id, e))?;

        info!(job_id = %job_id, "job cancellation requested");
        Ok(true)
    }

    /// Apply the store's retention policy now.
    pub async fn prune(&self) -> usize {
        self.store.prune(Utc::now()).await
    }
}
