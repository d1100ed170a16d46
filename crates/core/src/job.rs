//! Bulk-send job and per-recipient state machine.
//!
//! ```text
//! job:        pending -> processing -> completed
//! recipient:  pending -> sent | failed | skipped
//! ```
//!
//! `completed` only means every attempt concluded; it says nothing about how
//! many recipients succeeded. `skipped` is reachable only through cancellation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;
use crate::provider::{Provider, SmtpConfig};
use crate::recipient::Recipient;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, nothing sent yet
    Pending,
    /// Recipient loop is running
    Processing,
    /// Every recipient reached a terminal state
    Completed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

/// Per-recipient delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl RecipientStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecipientStatus::Pending)
    }
}

/// Mutable tracking entry for one recipient inside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientState {
    pub name: String,
    pub email: String,
    pub status: RecipientStatus,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl RecipientState {
    fn pending(recipient: Recipient) -> Self {
        Self {
            name: recipient.name,
            email: recipient.email,
            status: RecipientStatus::Pending,
            error: None,
            sent_at: None,
        }
    }

    pub fn recipient(&self) -> Recipient {
        Recipient::new(self.name.clone(), self.email.clone())
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "recipient {} already {:?}",
                self.email, self.status
            )));
        }
        Ok(())
    }

    fn mark_sent(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = RecipientStatus::Sent;
        self.sent_at = Some(at);
        Ok(())
    }

    fn mark_failed(&mut self, error: String) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = RecipientStatus::Failed;
        self.error = Some(error);
        Ok(())
    }

    fn mark_skipped(&mut self, reason: &str) {
        if !self.status.is_terminal() {
            self.status = RecipientStatus::Skipped;
            self.error = Some(reason.to_string());
        }
    }
}

/// Validated-on-create input for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub provider: Provider,
    pub smtp_config: Option<SmtpConfig>,
    pub recipients: Vec<Recipient>,
}

impl NewJob {
    pub fn validate(&self) -> DomainResult<()> {
        if self.subject.trim().is_empty() {
            return Err(DomainError::validation("subject is required"));
        }
        if self.body.trim().is_empty() {
            return Err(DomainError::validation("message body is required"));
        }
        if self.recipients.is_empty() {
            return Err(DomainError::validation("at least one recipient is required"));
        }
        if self.provider.requires_smtp_config() {
            match &self.smtp_config {
                Some(config) => config.validate()?,
                None => {
                    return Err(DomainError::validation(
                        "SMTP configuration is required for SMTP provider",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One bulk-send request and its progress.
#[derive(Debug, Clone, Serialize)]
pub struct EmailJob {
    pub id: JobId,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub provider: Provider,
    #[serde(skip_serializing)]
    pub smtp_config: Option<SmtpConfig>,
    pub status: JobStatus,
    pub recipients: Vec<RecipientState>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
}

impl EmailJob {
    /// Validate `spec` and build a pending job from it.
    pub fn create(spec: NewJob, now: DateTime<Utc>) -> DomainResult<Self> {
        spec.validate()?;

        let cc = spec
            .cc
            .map(|cc| cc.trim().to_string())
            .filter(|cc| !cc.is_empty());

        Ok(Self {
            id: JobId::new(),
            subject: spec.subject,
            body: spec.body,
            cc,
            provider: spec.provider,
            smtp_config: spec.smtp_config,
            status: JobStatus::Pending,
            recipients: spec
                .recipients
                .into_iter()
                .map(RecipientState::pending)
                .collect(),
            created_at: now,
            started_at: None,
            completed_at: None,
            cancel_requested: false,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `pending -> processing`. A job is processed at most once.
    pub fn mark_processing(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::Pending {
            return Err(DomainError::conflict(format!(
                "job {} is already {:?}",
                self.id, self.status
            )));
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn record_sent(&mut self, index: usize, now: DateTime<Utc>) -> DomainResult<()> {
        self.recipient_mut(index)?.mark_sent(now)
    }

    pub fn record_failed(&mut self, index: usize, error: impl Into<String>) -> DomainResult<()> {
        self.recipient_mut(index)?.mark_failed(error.into())
    }

    /// Mark every still-pending recipient as skipped. Returns how many were skipped.
    pub fn skip_remaining(&mut self, reason: &str) -> usize {
        let mut skipped = 0;
        for r in self.recipients.iter_mut().filter(|r| !r.status.is_terminal()) {
            r.mark_skipped(reason);
            skipped += 1;
        }
        skipped
    }

    /// `processing -> completed` (or `pending -> completed` when cancelled
    /// before start). Requires every recipient to be terminal.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::conflict(format!("job {} already completed", self.id)));
        }
        if let Some(r) = self.recipients.iter().find(|r| !r.status.is_terminal()) {
            return Err(DomainError::conflict(format!(
                "recipient {} has not been attempted",
                r.email
            )));
        }
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn progress(&self) -> JobProgress {
        let mut p = JobProgress {
            total: self.recipients.len(),
            ..JobProgress::default()
        };
        for r in &self.recipients {
            match r.status {
                RecipientStatus::Pending => p.remaining += 1,
                RecipientStatus::Sent => p.sent += 1,
                RecipientStatus::Failed => p.failed += 1,
                RecipientStatus::Skipped => p.skipped += 1,
            }
        }
        p
    }

    /// Ordered per-recipient view for status polling.
    pub fn outcomes(&self) -> Vec<RecipientOutcome> {
        self.recipients
            .iter()
            .enumerate()
            .map(|(index, r)| RecipientOutcome {
                id: format!("{}-{}", self.id, index),
                job_id: self.id,
                recipient_name: r.name.clone(),
                recipient_email: r.email.clone(),
                status: r.status,
                error_message: r.error.clone(),
                sent_at: r.sent_at,
            })
            .collect()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            subject: self.subject.clone(),
            provider: self.provider,
            status: self.status,
            progress: self.progress(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    fn recipient_mut(&mut self, index: usize) -> DomainResult<&mut RecipientState> {
        if self.status != JobStatus::Processing {
            return Err(DomainError::conflict(format!(
                "job {} is not processing",
                self.id
            )));
        }
        self.recipients
            .get_mut(index)
            .ok_or_else(|| DomainError::validation(format!("no recipient at index {index}")))
    }
}

/// Counts by recipient status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub remaining: usize,
}

/// Derived per-recipient result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientOutcome {
    pub id: String,
    pub job_id: JobId,
    pub recipient_name: String,
    pub recipient_email: String,
    pub status: RecipientStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Compact listing entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub subject: String,
    pub provider: Provider,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
