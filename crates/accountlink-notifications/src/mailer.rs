//! Mail delivery trait.

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::templates::MailContext;

/// Delivers rendered mail to a single recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Renders `template` with `context` and sends it to `to`.
    ///
    /// `subject` may contain the same placeholders as the body.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        template: &str,
        context: &MailContext,
    ) -> Result<(), NotificationError>;
}
