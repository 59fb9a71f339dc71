use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::config::MailerConfig;
use crate::error::NotificationError;
use crate::mailer::Mailer;
use crate::templates::{MailContext, TemplateRenderer};

/// Sends mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    renderer: Arc<TemplateRenderer>,
}

impl SmtpMailer {
    pub fn new(
        config: &MailerConfig,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_ref()
            .ok_or(NotificationError::InvalidConfig("Missing smtp_host".into()))?;

        let from = config
            .from
            .parse()
            .map_err(|e| NotificationError::InvalidConfig(format!("Invalid from: {}", e)))?;

        let mut transport_builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            transport_builder = transport_builder
                .credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: transport_builder.build(),
            from,
            renderer,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        context: &MailContext,
    ) -> Result<(), NotificationError> {
        let content = self.renderer.render(template, subject, context)?;

        let recipient: Mailbox = to
            .parse()
            .map_err(|e| NotificationError::InvalidRecipient(format!("{}: {}", to, e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(content.subject);

        let email = match content.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(content.body, html)),
            None => builder.header(ContentType::TEXT_PLAIN).body(content.body),
        }
        .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        tracing::info!(
            template = %template,
            code = %response.code(),
            "Mail delivered to SMTP relay"
        );
        Ok(())
    }
}
