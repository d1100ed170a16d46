use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bulksend_api::app::services::build_services_with;
use bulksend_api::config::AppConfig;
use bulksend_core::{Provider, SmtpConfig};
use bulksend_infra::jobs::JobExecutorHandle;
use bulksend_mail::{DispatchFailure, Dispatcher, Mailer, OutgoingEmail};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::json;

/// Accepts everything except `fail_for`, optionally slowly.
#[derive(Default)]
struct StubMailer {
    fail_for: Vec<&'static str>,
    delay: Option<Duration>,
}

#[async_trait]
impl Mailer for StubMailer {
    async fn send(
        &self,
        email: &OutgoingEmail,
        _smtp: Option<&SmtpConfig>,
    ) -> Result<(), DispatchFailure> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_for.iter().any(|addr| *addr == email.to.email) {
            return Err(DispatchFailure::Smtp("550 mailbox unavailable".into()));
        }
        Ok(())
    }
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    _executor: Option<JobExecutorHandle>,
}

impl TestServer {
    async fn spawn(smtp: StubMailer) -> Self {
        Self::spawn_with(smtp, true).await
    }

    async fn spawn_with(smtp: StubMailer, executor_running: bool) -> Self {
        // Same router as prod, with the SMTP transport stubbed and an ephemeral port.
        let dispatcher = Dispatcher::default().with_shared_mailer(Provider::Smtp, Arc::new(smtp));
        let (services, executor) = build_services_with(&AppConfig::default(), dispatcher);
        let executor = if executor_running {
            Some(executor)
        } else {
            executor.shutdown().await;
            None
        };
        let app = bulksend_api::app::build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            _executor: executor,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn smtp_job(recipients: serde_json::Value) -> serde_json::Value {
    json!({
        "subject": "Hello {{name}}",
        "message": "Hi {{name}}, this is for {{email}}",
        "provider": "smtp",
        "recipients": recipients,
        "smtpConfig": {
            "host": "smtp.example.com",
            "port": 587,
            "secure": false,
            "user": "sender@example.com",
            "pass": "secret"
        }
    })
}

async fn send_job(client: &reqwest::Client, srv: &TestServer, body: serde_json::Value) -> String {
    let res = client
        .post(srv.url("/api/email/send-emails"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["status"], "processing");
    created["jobId"].as_str().unwrap().to_string()
}

async fn wait_for_completion(
    client: &reqwest::Client,
    srv: &TestServer,
    job_id: &str,
) -> serde_json::Value {
    // Processing runs in the background; poll until the job reports completed.
    for _ in 0..200 {
        let res = client
            .get(srv.url(&format!("/api/email/status/{job_id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: serde_json::Value = res.json().await.unwrap();
        if body["status"] == "completed" {
            return body;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("job {job_id} did not complete within timeout");
}

#[tokio::test]
async fn health_reports_ok() {
    let srv = TestServer::spawn(StubMailer::default()).await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "success": true, "message": "ok" }));
}

#[tokio::test]
async fn send_then_poll_reports_per_recipient_outcomes() {
    let srv = TestServer::spawn(StubMailer {
        fail_for: vec!["b@x.com"],
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let job_id = send_job(
        &client,
        &srv,
        smtp_job(json!([
            { "name": "A", "email": "a@x.com" },
            { "name": "B", "email": "b@x.com" }
        ])),
    )
    .await;

    let status = wait_for_completion(&client, &srv, &job_id).await;
    assert_eq!(status["jobId"], job_id.as_str());
    assert_eq!(
        status["progress"],
        json!({ "total": 2, "sent": 1, "failed": 1, "skipped": 0, "remaining": 0 })
    );

    let results = status["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], format!("{job_id}-0"));
    assert_eq!(results[0]["recipientEmail"], "a@x.com");
    assert_eq!(results[0]["status"], "sent");
    assert!(results[0]["sentAt"].is_string());
    assert!(results[0].get("errorMessage").is_none());

    assert_eq!(results[1]["recipientEmail"], "b@x.com");
    assert_eq!(results[1]["status"], "failed");
    assert!(!results[1]["errorMessage"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn outlook_jobs_fail_every_recipient() {
    let srv = TestServer::spawn(StubMailer::default()).await;
    let client = reqwest::Client::new();

    let job_id = send_job(
        &client,
        &srv,
        json!({
            "subject": "s",
            "message": "m",
            "provider": "outlook",
            "recipients": [
                { "name": "A", "email": "a@x.com" },
                { "name": "B", "email": "b@x.com" },
                { "name": "C", "email": "c@x.com" }
            ]
        }),
    )
    .await;

    let status = wait_for_completion(&client, &srv, &job_id).await;
    assert_eq!(status["progress"]["failed"], 3);
    assert_eq!(status["progress"]["sent"], 0);
    for r in status["results"].as_array().unwrap() {
        assert_eq!(r["errorMessage"], "Outlook API requires OAuth setup");
    }
}

#[tokio::test]
async fn invalid_send_requests_are_rejected() {
    let srv = TestServer::spawn(StubMailer::default()).await;
    let client = reqwest::Client::new();

    let mut missing_subject = smtp_job(json!([{ "name": "A", "email": "a@x.com" }]));
    missing_subject["subject"] = json!("");
    let mut missing_smtp = smtp_job(json!([{ "name": "A", "email": "a@x.com" }]));
    missing_smtp.as_object_mut().unwrap().remove("smtpConfig");
    let no_recipients = smtp_job(json!([]));
    let bad_provider = json!({ "subject": "s", "message": "m", "provider": "pigeon",
        "recipients": [{ "name": "A", "email": "a@x.com" }] });

    for body in [missing_subject, missing_smtp, no_recipients, bad_provider] {
        let res = client
            .post(srv.url("/api/email/send-emails"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let err: serde_json::Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
        assert!(err["message"].is_string());
    }

    let res = client.get(srv.url("/api/email/jobs")).send().await.unwrap();
    let list: serde_json::Value = res.json().await.unwrap();
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn status_of_unknown_or_malformed_job() {
    let srv = TestServer::spawn(StubMailer::default()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url(&format!("/api/email/status/{}", bulksend_core::JobId::new())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "not_found");

    let res = client
        .get(srv.url("/api/email/status/not-a-job"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn smtp_config_check_validates_shape_only() {
    let srv = TestServer::spawn(StubMailer::default()).await;
    let client = reqwest::Client::new();

    let cases = [
        (
            json!({ "host": "smtp.x.com", "port": 587, "user": "u", "pass": "p" }),
            StatusCode::OK,
            true,
        ),
        (
            json!({ "host": "smtp.x.com", "port": 70000, "user": "u", "pass": "p" }),
            StatusCode::BAD_REQUEST,
            false,
        ),
        (
            json!({ "host": "smtp.x.com", "user": "u", "pass": "p" }),
            StatusCode::BAD_REQUEST,
            false,
        ),
        (
            json!({ "host": "", "port": 25, "user": "u", "pass": "p" }),
            StatusCode::BAD_REQUEST,
            false,
        ),
    ];

    for (body, expected_status, valid) in cases {
        let res = client
            .post(srv.url("/api/email/smtp-config"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected_status, "body: {body}");
        let out: serde_json::Value = res.json().await.unwrap();
        assert_eq!(out["valid"], valid);
    }
}

fn csv_form(filename: &str, contents: &str) -> Form {
    Form::new().part(
        "file",
        Part::bytes(contents.as_bytes().to_vec())
            .file_name(filename.to_string())
            .mime_str("text/csv")
            .unwrap(),
    )
}

#[tokio::test]
async fn csv_upload_returns_recipients() {
    let srv = TestServer::spawn(StubMailer::default()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/email/upload"))
        .multipart(csv_form("list.csv", "Name,Email\nAna,a@x.com\nBo , b@x.com \n"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"],
        json!([{ "name": "Ana", "email": "a@x.com" }, { "name": "Bo", "email": "b@x.com" }])
    );
    assert_eq!(body["message"], "Successfully processed 2 recipients");
}

#[tokio::test]
async fn bad_uploads_are_rejected_whole() {
    let srv = TestServer::spawn(StubMailer::default()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/email/upload"))
        .multipart(csv_form("list.csv", "name,email\nAna,a@x.com\nBo,nope\n"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["message"], "Invalid email: nope");

    let res = client
        .post(srv.url("/api/email/upload"))
        .multipart(csv_form("list.txt", "name,email\n"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/api/email/upload"))
        .multipart(Form::new().text("note", "no file here"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "No file uploaded");
}

#[tokio::test]
async fn jobs_can_be_listed_and_cancelled() {
    let srv = TestServer::spawn(StubMailer {
        delay: Some(Duration::from_millis(30)),
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let recipients: Vec<_> = (0..50)
        .map(|i| json!({ "name": format!("R{i}"), "email": format!("r{i}@x.com") }))
        .collect();
    let job_id = send_job(&client, &srv, smtp_job(json!(recipients))).await;

    let res = client.get(srv.url("/api/email/jobs")).send().await.unwrap();
    let list: serde_json::Value = res.json().await.unwrap();
    assert_eq!(list["items"][0]["id"], job_id.as_str());

    let res = client
        .delete(srv.url(&format!("/api/email/jobs/{job_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["cancelled"], true);

    let status = wait_for_completion(&client, &srv, &job_id).await;
    assert!(status["progress"]["skipped"].as_u64().unwrap() > 0);
    assert_eq!(status["progress"]["remaining"], 0);

    let res = client
        .delete(srv.url(&format!("/api/email/jobs/{}", bulksend_core::JobId::new())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_without_running_executor_leaves_no_pending_job() {
    let srv = TestServer::spawn_with(StubMailer::default(), false).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/email/send-emails"))
        .json(&smtp_job(json!([
            { "name": "Ana", "email": "a@x.com" },
            { "name": "Bo", "email": "b@x.com" }
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "internal_error");

    let res = client.get(srv.url("/api/email/jobs")).send().await.unwrap();
    let list: serde_json::Value = res.json().await.unwrap();
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["status"], "completed");
    assert_eq!(items[0]["progress"]["skipped"], 2);
    assert_eq!(items[0]["progress"]["remaining"], 0);
}
