//! Email providers and their connection parameters.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// External sending mechanism selected per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Smtp,
    Gmail,
    Outlook,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Smtp, Provider::Gmail, Provider::Outlook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Smtp => "smtp",
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
        }
    }

    /// Whether jobs for this provider must carry an [`SmtpConfig`].
    pub fn requires_smtp_config(&self) -> bool {
        matches!(self, Provider::Smtp)
    }
}

impl core::fmt::Display for Provider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(Provider::Smtp),
            "gmail" => Ok(Provider::Gmail),
            "outlook" => Ok(Provider::Outlook),
            other => Err(DomainError::validation(format!(
                "unsupported provider: {other} (expected smtp, gmail or outlook)"
            ))),
        }
    }
}

/// SMTP connection parameters supplied with a job.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (usually port 465). When false, STARTTLS is used if offered.
    #[serde(default)]
    pub secure: bool,
    pub user: String,
    pub pass: String,
}

impl SmtpConfig {
    /// Shape-only validation; never probes the server.
    pub fn validate(&self) -> DomainResult<()> {
        if self.host.trim().is_empty() {
            return Err(DomainError::validation("smtp host is required"));
        }
        if self.port == 0 {
            return Err(DomainError::validation("smtp port must be in 1..=65535"));
        }
        if self.user.trim().is_empty() {
            return Err(DomainError::validation("smtp user is required"));
        }
        if self.pass.is_empty() {
            return Err(DomainError::validation("smtp password is required"));
        }
        Ok(())
    }
}

impl core::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}
