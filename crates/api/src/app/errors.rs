use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use bulksend_infra::jobs::JobError;

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        JobError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", "Job not found"),
        JobError::AlreadyStarted(id) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("job {id} has already started"),
        ),
        JobError::Unavailable(msg) | JobError::Store(msg) => {
            error!(error = %msg, "job request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
