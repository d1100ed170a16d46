//! Bulk-send job processing.
//!
//! ## Design
//!
//! - Jobs live in an explicit store object, shared by `Arc` (no globals)
//! - Creation is synchronous and returns the id; nothing is sent yet
//! - Processing is submitted to the executor and runs as one task per job
//! - Recipients inside a job are attempted strictly in order, one at a time
//! - A failed send is recorded on that recipient and the loop moves on
//!
//! ## Components
//!
//! - `JobStore`: storage for jobs (in-memory, with a retention policy)
//! - `JobOrchestrator`: create / process / query / cancel operations
//! - `JobExecutor`: queue + worker that runs submitted jobs in the background

pub mod executor;
pub mod orchestrator;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle};
pub use orchestrator::{JobError, JobOrchestrator};
pub use store::{InMemoryJobStore, JobMutation, JobStore, JobStoreError};
pub use types::{JobStatusView, OrchestratorConfig, RetentionPolicy};
