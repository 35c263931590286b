//! Outgoing mail.
//!
//! The service only needs "send this message once"; delivery is behind the
//! `Mailer` trait so SMTP can be swapped for a logger or a test double.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Message build failed: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A single outgoing HTML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers mail. Implementations make exactly one attempt per call.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// SMTP delivery via lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build from an SMTP URL (`smtp://`, `smtps://`) and a sender mailbox.
    pub fn from_url(url: &str, from: &str) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(url)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .build();
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(e.to_string()))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(e.to_string()))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(to = %message.to, subject = %message.subject, "mail sent");
        Ok(())
    }
}

/// Development mailer: logs instead of delivering. The body goes to `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        warn!(to = %message.to, subject = %message.subject, "no SMTP server configured; mail not delivered");
        debug!(body = %message.html, "undelivered mail body");
        Ok(())
    }
}

/// The password reset message carrying `token`.
pub fn reset_password_message(to: &str, token: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Password reset token".to_string(),
        html: format!(
            "<p>Here is your password reset token. Submit it with your new password to reset it.</p>\n<p>{token}</p>"
        ),
    }
}
