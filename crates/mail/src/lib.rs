//! Transport dispatch: deliver one rendered email to one recipient.
//!
//! The job orchestrator only sees [`Dispatcher::dispatch`]; each
//! [`Provider`] maps to a [`Mailer`] implementation:
//!
//! | provider  | mailer                | behavior                                  |
//! |-----------|-----------------------|-------------------------------------------|
//! | `smtp`    | [`SmtpMailer`]        | one lettre session per send               |
//! | `gmail`   | [`UnavailableMailer`] | deterministic "requires OAuth setup" error |
//! | `outlook` | [`UnavailableMailer`] | deterministic "requires OAuth setup" error |
//!
//! A real Gmail/Outlook integration plugs in as another [`Mailer`] through
//! [`Dispatcher::with_mailer`].

mod dispatcher;
mod mailer;
mod message;

pub use dispatcher::Dispatcher;
pub use mailer::{Mailer, SmtpMailer, SmtpMailerConfig, UnavailableMailer};
pub use message::OutgoingEmail;

use std::time::Duration;

use bulksend_core::Provider;
use thiserror::Error;

/// Why a single recipient send failed.
///
/// The `Display` text is what ends up in the recipient's error message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchFailure {
    #[error("{} API requires OAuth setup", api_name(.0))]
    ProviderUnavailable(Provider),

    #[error("SMTP configuration missing for SMTP provider")]
    MissingSmtpConfig,

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP email failed: {0}")]
    Smtp(String),

    #[error("send timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

fn api_name(provider: &Provider) -> &'static str {
    match provider {
        Provider::Smtp => "SMTP",
        Provider::Gmail => "Gmail",
        Provider::Outlook => "Outlook",
    }
}
