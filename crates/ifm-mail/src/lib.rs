pub mod codes;
pub mod mailer;
pub mod transport;

use thiserror::Error;

pub use codes::CodeStore;
pub use mailer::VerificationMailer;
pub use transport::{LogTransport, MailTransport, OutgoingMail, SmtpConfig, SmtpTransport};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}
