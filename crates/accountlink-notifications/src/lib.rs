pub mod adapters;
pub mod config;
pub mod error;
pub mod mailer;
pub mod notifier;
pub mod templates;

pub use adapters::{LogMailer, SentMail, SmtpMailer};
pub use config::{MailTransport, MailerConfig};
pub use error::NotificationError;
pub use mailer::Mailer;
pub use notifier::{FlashNotifier, NOTICE_CAPACITY, Notice, NoticeKind, Notifier};
pub use templates::{MailContext, RenderedContent, Template, TemplateRenderer};
