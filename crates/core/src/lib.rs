//! `bulksend-core`: domain building blocks for bulk email jobs.
//!
//! This crate contains **pure domain** types (no I/O, no runtime): recipients,
//! providers, the job/recipient state machine and template rendering.

pub mod error;
pub mod id;
pub mod job;
pub mod provider;
pub mod recipient;
pub mod template;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use job::{
    EmailJob, JobProgress, JobStatus, JobSummary, NewJob, RecipientOutcome, RecipientState,
    RecipientStatus,
};
pub use provider::{Provider, SmtpConfig};
pub use recipient::{is_valid_email, Recipient};
pub use template::render;
