pub mod log;
pub mod smtp;

pub use log::{LogMailer, SentMail};
pub use smtp::SmtpMailer;
