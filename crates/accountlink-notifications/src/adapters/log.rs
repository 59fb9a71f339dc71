use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::NotificationError;
use crate::mailer::Mailer;
use crate::templates::{MailContext, RenderedContent, TemplateRenderer};

/// Number of messages the outbox retains.
pub const OUTBOX_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub template: String,
    pub content: RenderedContent,
}

/// Development transport: logs deliveries and keeps the most recent
/// messages in memory instead of sending them.
pub struct LogMailer {
    renderer: Arc<TemplateRenderer>,
    outbox: Mutex<VecDeque<SentMail>>,
}

impl LogMailer {
    pub fn new(renderer: Arc<TemplateRenderer>) -> Self {
        Self {
            renderer,
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the retained messages, oldest first.
    pub async fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().await.iter().cloned().collect()
    }

    /// Drains the retained messages, oldest first.
    pub async fn take(&self) -> Vec<SentMail> {
        self.outbox.lock().await.drain(..).collect()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        context: &MailContext,
    ) -> Result<(), NotificationError> {
        if !to.contains('@') {
            return Err(NotificationError::InvalidRecipient(to.to_string()));
        }
        let content = self.renderer.render(template, subject, context)?;

        tracing::info!(
            to = %to,
            template = %template,
            subject = %content.subject,
            "Mail captured by log transport"
        );

        let mut outbox = self.outbox.lock().await;
        if outbox.len() == OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(SentMail {
            to: to.to_string(),
            template: template.to_string(),
            content,
        });
        Ok(())
    }
}
