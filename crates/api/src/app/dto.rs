use serde::{Deserialize, Serialize};

use bulksend_core::{JobId, NewJob, Provider, Recipient, SmtpConfig};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RecipientRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmtpConfigRequest {
    pub host: String,
    pub port: i64,
    pub secure: bool,
    pub user: String,
    pub pass: String,
}

impl SmtpConfigRequest {
    fn into_config(self) -> Result<SmtpConfig, String> {
        let port = u16::try_from(self.port)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| "Invalid port number".to_string())?;
        Ok(SmtpConfig {
            host: self.host,
            port,
            secure: self.secure,
            user: self.user,
            pass: self.pass,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailsRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    pub cc: Option<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub recipients: Vec<RecipientRequest>,
    pub smtp_config: Option<SmtpConfigRequest>,
}

impl SendEmailsRequest {
    /// Map the wire shape onto a job spec. Field-level checks beyond the
    /// provider name and port range happen in `NewJob::validate`.
    pub fn into_new_job(self) -> Result<NewJob, String> {
        if self.provider.trim().is_empty() {
            return Err("provider is required".to_string());
        }
        let provider: Provider = self
            .provider
            .trim()
            .parse()
            .map_err(|e: bulksend_core::DomainError| e.to_string())?;

        // Credentials sent alongside a non-SMTP provider are ignored.
        let smtp_config = match self.smtp_config {
            Some(cfg) if provider.requires_smtp_config() => Some(cfg.into_config()?),
            _ => None,
        };

        Ok(NewJob {
            subject: self.subject,
            body: self.message,
            cc: self.cc,
            provider,
            smtp_config,
            recipients: self
                .recipients
                .into_iter()
                .map(|r| Recipient::new(r.name.trim(), r.email.trim()))
                .collect(),
        })
    }
}

/// Body of `POST /smtp-config`; every field optional so missing ones can be
/// reported instead of rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmtpConfigCheck {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub secure: Option<bool>,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl SmtpConfigCheck {
    /// `Err` carries the message returned to the client.
    pub fn check(&self) -> Result<(), &'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let port = self.port.filter(|p| *p != 0);

        if !present(&self.host) || port.is_none() || !present(&self.user) || !present(&self.pass) {
            return Err("Missing required SMTP configuration fields");
        }
        if !port.is_some_and(|p| (1..=65535).contains(&p)) {
            return Err("Invalid port number");
        }
        Ok(())
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub data: Vec<Recipient>,
    pub message: String,
}

impl UploadResponse {
    pub fn accepted(data: Vec<Recipient>) -> Self {
        let message = format!("Successfully processed {} recipients", data.len());
        Self {
            success: true,
            data,
            message,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailsResponse {
    pub job_id: JobId,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SmtpCheckResponse {
    pub valid: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}
