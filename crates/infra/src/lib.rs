//! Infrastructure layer: in-memory job store, orchestration, background
//! runner and recipient file ingestion.

pub mod ingest;
pub mod jobs;
