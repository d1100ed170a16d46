use axum::{
    routing::{delete, get, post},
    Router,
};

pub mod email;
pub mod system;

/// Router for the `/api/email` endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/upload", post(email::upload))
        .route("/send-emails", post(email::send_emails))
        .route("/status/:job_id", get(email::job_status))
        .route("/smtp-config", post(email::check_smtp_config))
        .route("/jobs", get(email::list_jobs))
        .route("/jobs/:job_id", delete(email::cancel_job))
}
