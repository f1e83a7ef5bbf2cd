use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::info;

use crate::transport::parse_mailbox;
use crate::{CodeStore, MailError, MailTransport, OutgoingMail};

pub const CODE_LENGTH: usize = 6;

/// Issues numeric one-time codes by mail and checks them later.
pub struct VerificationMailer {
    transport: Arc<dyn MailTransport>,
    codes: CodeStore,
    from: String,
}

impl VerificationMailer {
    pub fn new(transport: Arc<dyn MailTransport>, from: impl Into<String>, ttl: Duration) -> Self {
        Self {
            transport,
            codes: CodeStore::new(ttl),
            from: from.into(),
        }
    }

    /// Generate a code, mail it to `to` and remember it for `verify`.
    /// The code is only stored once delivery succeeded.
    pub async fn generate_and_send(&self, to: &str) -> Result<(), MailError> {
        let to = to.trim();
        parse_mailbox(to)?;

        let code = generate_code(CODE_LENGTH);
        let mail = OutgoingMail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: "Verification code".to_string(),
            html_body: format!(
                "Welcome to iFM! Your verification code is: <b>{}</b>. It expires in {} minutes.",
                code,
                self.codes.ttl().as_secs().div_ceil(60)
            ),
        };

        self.transport.send(&mail).await?;
        self.codes.insert(to, code);
        info!("Verification code sent to {}", to);
        Ok(())
    }

    pub fn verify(&self, to: &str, code: &str) -> bool {
        self.codes.verify(to, code)
    }
}

fn generate_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
