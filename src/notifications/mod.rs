use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// An outbound mail message, currently only used for low-stock alerts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl OutboundMail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// Mailer errors
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(String),
    #[error("No recipient configured")]
    NoRecipient,
}

/// Trait for mail delivery backends
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError>;
}

/// Mailer that writes messages to the log. Used in development and tests,
/// and as the fallback when no SMTP relay is configured.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, "outbound mail:\n{}", mail.body);
        Ok(())
    }
}

/// Sends a mail, logging the failure instead of propagating it. Alerting is
/// best effort and must never fail the operation that triggered it.
pub async fn send_or_log(mailer: &dyn Mailer, mail: OutboundMail) {
    let subject = mail.subject.clone();
    if let Err(e) = mailer.send(mail).await {
        warn!(%subject, "failed to send mail: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_mail() {
        let mailer = LogMailer;
        let mail = OutboundMail::new("ops@example.com", "test", "body");
        assert!(mailer.send(mail).await.is_ok());
    }
}
