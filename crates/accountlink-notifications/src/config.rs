//! Mailer configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [mailer]
//! transport = "smtp"
//! from = "AccountLink <no-reply@example.com>"
//! site_name = "AccountLink"
//! smtp_host = "smtp.example.com"
//! smtp_port = 587
//! smtp_username = "mailer"
//! smtp_password = "secret"
//! ```

use std::fmt;
use std::sync::Arc;

use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

use crate::adapters::{LogMailer, SmtpMailer};
use crate::error::NotificationError;
use crate::mailer::Mailer;
use crate::templates::TemplateRenderer;

/// Mail transport selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Keep mail in memory and log deliveries. For development.
    #[default]
    Log,
    /// Deliver through an SMTP relay.
    Smtp,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailerConfig {
    pub transport: MailTransport,

    /// Sender mailbox, e.g. `AccountLink <no-reply@example.com>`.
    pub from: String,

    /// Product name substituted into templates as `{{site_name}}`.
    pub site_name: String,

    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            from: "AccountLink <no-reply@localhost>".to_string(),
            site_name: "AccountLink".to_string(),
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
        }
    }
}

impl fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailerConfig")
            .field("transport", &self.transport)
            .field("from", &self.from)
            .field("site_name", &self.site_name)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .finish_non_exhaustive()
    }
}

impl MailerConfig {
    pub fn validate(&self) -> Result<(), NotificationError> {
        self.from
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidConfig(format!("Invalid from: {}", e)))?;

        if self.site_name.trim().is_empty() {
            return Err(NotificationError::InvalidConfig(
                "site_name cannot be empty".into(),
            ));
        }

        if self.transport == MailTransport::Smtp {
            if self.smtp_host.as_deref().is_none_or(|h| h.trim().is_empty()) {
                return Err(NotificationError::InvalidConfig(
                    "Missing smtp_host".into(),
                ));
            }
            if self.smtp_port == 0 {
                return Err(NotificationError::InvalidConfig(
                    "smtp_port must be > 0".into(),
                ));
            }
            if self.smtp_username.is_some() != self.smtp_password.is_some() {
                return Err(NotificationError::InvalidConfig(
                    "smtp_username and smtp_password must be set together".into(),
                ));
            }
        }

        Ok(())
    }

    /// Builds the configured transport.
    pub fn build_mailer(
        &self,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Arc<dyn Mailer>, NotificationError> {
        self.validate()?;
        Ok(match self.transport {
            MailTransport::Log => Arc::new(LogMailer::new(renderer)),
            MailTransport::Smtp => Arc::new(SmtpMailer::new(self, renderer)?),
        })
    }
}
