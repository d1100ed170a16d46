use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Extension, Multipart, Path,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

use bulksend_core::JobId;
use bulksend_infra::ingest;

use crate::app::{dto, errors, services::AppServices};

const FILE_FIELD: &str = "file";

fn upload_rejected(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(dto::UploadResponse::rejected(message))).into_response()
}

fn parse_job_id(raw: &str) -> Result<JobId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id"))
}

/// POST /api/email/upload
///
/// Parse the `file` field of a multipart upload into recipients.
pub async fn upload(multipart: Result<Multipart, MultipartRejection>) -> axum::response::Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(e) => return upload_rejected(StatusCode::BAD_REQUEST, e.body_text()),
    };

    let (filename, bytes) = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(FILE_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => break (filename, bytes),
                    Err(e) => return upload_rejected(e.status(), e.body_text()),
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => return upload_rejected(StatusCode::BAD_REQUEST, "No file uploaded"),
            Err(e) => return upload_rejected(e.status(), e.body_text()),
        }
    };

    let size = bytes.len();
    let parsed = {
        let filename = filename.clone();
        tokio::task::spawn_blocking(move || ingest::parse_recipients(&filename, &bytes)).await
    };

    match parsed {
        Ok(Ok(recipients)) => {
            info!(
                filename = %filename,
                bytes = size,
                recipients = recipients.len(),
                "recipient file accepted"
            );
            (StatusCode::OK, Json(dto::UploadResponse::accepted(recipients))).into_response()
        }
        Ok(Err(e)) => {
            warn!(filename = %filename, error = %e, "recipient file rejected");
            upload_rejected(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            format!("file processing failed: {e}"),
        ),
    }
}

/// POST /api/email/send-emails
///
/// Create a job and queue it; the response does not wait for any send.
pub async fn send_emails(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SendEmailsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                e.body_text(),
            );
        }
    };

    let spec = match body.into_new_job() {
        Ok(spec) => spec,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    let job_id = match services.orchestrator.create_job(spec).await {
        Ok(id) => id,
        Err(e) => return errors::job_error_to_response(e),
    };

    if let Err(e) = services.executor.submit(job_id) {
        // Nothing will ever run the job; complete it as skipped so retention can evict it.
        if let Err(cancel_err) = services.orchestrator.cancel_job(job_id).await {
            warn!(job_id = %job_id, error = %cancel_err, "failed to cancel unqueued job");
        }
        return errors::job_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(dto::SendEmailsResponse {
            job_id,
            status: "processing",
        }),
    )
        .into_response()
}

/// GET /api/email/status/:job_id
pub async fn job_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orchestrator.job_status(job_id).await {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Job not found"),
    }
}

/// POST /api/email/smtp-config
///
/// Shape check only; no connection is attempted.
pub async fn check_smtp_config(
    body: Result<Json<dto::SmtpConfigCheck>, JsonRejection>,
) -> axum::response::Response {
    let result = match body {
        Ok(Json(check)) => check.check(),
        Err(_) => Err("Missing required SMTP configuration fields"),
    };

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(dto::SmtpCheckResponse {
                valid: true,
                message: "SMTP configuration is valid",
            }),
        )
            .into_response(),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(dto::SmtpCheckResponse {
                valid: false,
                message,
            }),
        )
            .into_response(),
    }
}

/// GET /api/email/jobs
pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services.orchestrator.list_jobs().await;
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// DELETE /api/email/jobs/:job_id
pub async fn cancel_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orchestrator.cancel_job(job_id).await {
        Ok(cancelled) => (
            StatusCode::OK,
            Json(dto::CancelResponse { job_id, cancelled }),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}
