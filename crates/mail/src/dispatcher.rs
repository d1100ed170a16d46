use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use bulksend_core::{Provider, SmtpConfig};

use super::{
    DispatchFailure, Mailer, OutgoingEmail, SmtpMailer, SmtpMailerConfig, UnavailableMailer,
};

/// Provider-keyed set of mailers.
#[derive(Clone)]
pub struct Dispatcher {
    mailers: HashMap<Provider, Arc<dyn Mailer>>,
}

impl Dispatcher {
    /// SMTP through lettre; Gmail and Outlook unavailable.
    pub fn new(smtp: SmtpMailerConfig) -> Self {
        Self::empty()
            .with_mailer(Provider::Smtp, SmtpMailer::new(smtp))
            .with_mailer(Provider::Gmail, UnavailableMailer::new(Provider::Gmail))
            .with_mailer(Provider::Outlook, UnavailableMailer::new(Provider::Outlook))
    }

    /// No mailers registered; every provider fails as unavailable.
    pub fn empty() -> Self {
        Self {
            mailers: HashMap::new(),
        }
    }

    /// Register (or replace) the mailer for `provider`.
    pub fn with_mailer(mut self, provider: Provider, mailer: impl Mailer) -> Self {
        self.mailers.insert(provider, Arc::new(mailer));
        self
    }

    pub fn with_shared_mailer(mut self, provider: Provider, mailer: Arc<dyn Mailer>) -> Self {
        self.mailers.insert(provider, mailer);
        self
    }

    /// Perform exactly one send for one recipient.
    pub async fn dispatch(
        &self,
        provider: Provider,
        email: &OutgoingEmail,
        smtp: Option<&SmtpConfig>,
    ) -> Result<(), DispatchFailure> {
        let Some(mailer) = self.mailers.get(&provider) else {
            return Err(DispatchFailure::ProviderUnavailable(provider));
        };

        debug!(provider = %provider, to = %email.to.email, "dispatching email");
        mailer.send(email, smtp).await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(SmtpMailerConfig::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("providers", &self.mailers.keys().collect::<Vec<_>>())
            .finish()
    }
}
