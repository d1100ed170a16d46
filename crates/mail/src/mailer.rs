//! Mailer trait and provider implementations.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use bulksend_core::{Provider, SmtpConfig};

use super::{DispatchFailure, OutgoingEmail};

/// Sends one email to one recipient.
///
/// Implement this trait to provide another backend (e.g. a Gmail API client).
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(
        &self,
        email: &OutgoingEmail,
        smtp: Option<&SmtpConfig>,
    ) -> Result<(), DispatchFailure>;
}

/// Settings shared by every SMTP session the mailer opens.
#[derive(Debug, Clone)]
pub struct SmtpMailerConfig {
    /// Connection/command timeout enforced by lettre.
    pub timeout: Duration,
    /// EHLO name; lettre's default (local hostname) when `None`.
    pub hello_name: Option<String>,
}

impl Default for SmtpMailerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            hello_name: None,
        }
    }
}

/// SMTP mailer using lettre.
///
/// Credentials come with each job, so a transport is built per send rather
/// than held for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct SmtpMailer {
    config: SmtpMailerConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpMailerConfig) -> Self {
        Self { config }
    }

    fn transport(
        &self,
        smtp: &SmtpConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchFailure> {
        let mut builder = if smtp.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
                .map_err(|e| DispatchFailure::Smtp(e.to_string()))?
        } else {
            let tls = TlsParameters::new(smtp.host.clone())
                .map_err(|e| DispatchFailure::Smtp(e.to_string()))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
                .tls(Tls::Opportunistic(tls))
        };

        builder = builder
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.pass.clone()))
            .timeout(Some(self.config.timeout));

        if let Some(name) = &self.config.hello_name {
            builder = builder.hello_name(ClientId::Domain(name.clone()));
        }

        Ok(builder.build())
    }
}

/// Build the lettre message: `From: <sender>`, `To: <recipient>`, optional Cc,
/// plain-text body.
pub(crate) fn build_message(
    email: &OutgoingEmail,
    sender: &str,
) -> Result<Message, DispatchFailure> {
    let from: Mailbox = sender
        .parse()
        .map_err(|_| DispatchFailure::InvalidAddress(sender.to_string()))?;

    let to_address: Address = email
        .to
        .email
        .parse()
        .map_err(|_| DispatchFailure::InvalidAddress(email.to.email.clone()))?;
    let to_name = Some(email.to.name.trim().to_string()).filter(|n| !n.is_empty());

    let mut builder = Message::builder()
        .from(from)
        .to(Mailbox::new(to_name, to_address))
        .subject(email.subject.as_str());

    for cc in email.cc_addresses() {
        let mailbox: Mailbox = cc
            .parse()
            .map_err(|_| DispatchFailure::InvalidAddress(cc.to_string()))?;
        builder = builder.cc(mailbox);
    }

    builder
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| DispatchFailure::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        email: &OutgoingEmail,
        smtp: Option<&SmtpConfig>,
    ) -> Result<(), DispatchFailure> {
        let smtp = smtp.ok_or(DispatchFailure::MissingSmtpConfig)?;
        let message = build_message(email, &smtp.user)?;

        self.transport(smtp)?
            .send(message)
            .await
            .map_err(|e| DispatchFailure::Smtp(e.to_string()))?;

        Ok(())
    }
}

/// Stand-in for providers whose credential flow does not exist yet.
///
/// Fails every send without touching the network.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableMailer {
    provider: Provider,
}

impl UnavailableMailer {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Mailer for UnavailableMailer {
    async fn send(
        &self,
        _email: &OutgoingEmail,
        _smtp: Option<&SmtpConfig>,
    ) -> Result<(), DispatchFailure> {
        Err(DispatchFailure::ProviderUnavailable(self.provider))
    }
}
