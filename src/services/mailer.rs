//! Outgoing mail: three message kinds, queued and sent off the request path.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MailConfig;
use crate::db::{Token, User, UserInvite};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<()>;
}

/// Delivers through an SMTP relay using STARTTLS.
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailSender {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP relay '{}'", config.host))?
            .port(config.port);

        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, mail: Mail) -> Result<()> {
        let message = Message::builder()
            .from(mail.from.parse().context("Invalid sender address")?)
            .to(mail.to.parse().context("Invalid recipient address")?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .context("Failed to build mail")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        Ok(())
    }
}

/// Used when mail is disabled: logs the envelope instead of sending.
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: Mail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "Mail delivery disabled, dropping message");
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct RecordingMailSender {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailSender {
    #[must_use]
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, mail: Mail) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        Ok(())
    }
}

/// Builds the three message kinds and hands them to a background consumer.
///
/// Enqueueing never waits: with a full queue the message is dropped and
/// logged. Delivery errors are logged by the consumer.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<Mail>,
    sender: String,
    subject_prefix: String,
    base_url: String,
}

impl Mailer {
    /// Spawns the single consumer task and returns the producer handle.
    pub fn start(
        transport: Arc<dyn MailSender>,
        config: &MailConfig,
        base_url: &str,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Mail>(config.queue_size.max(1));

        let handle = tokio::spawn(async move {
            while let Some(mail) = rx.recv().await {
                let to = mail.to.clone();
                match transport.send(mail).await {
                    Ok(()) => debug!(to = %to, "Mail sent"),
                    Err(e) => error!(to = %to, error = %e, "Failed to send mail"),
                }
            }
            debug!("Mail queue closed");
        });

        let mailer = Self {
            tx,
            sender: config.sender.clone(),
            subject_prefix: config.subject_prefix.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        };

        (mailer, handle)
    }

    fn subject(&self, text: &str) -> String {
        if self.subject_prefix.is_empty() {
            text.to_string()
        } else {
            format!("{} {text}", self.subject_prefix)
        }
    }

    fn enqueue(&self, to: &str, subject: &str, body: String) {
        let mail = Mail {
            from: self.sender.clone(),
            to: to.to_string(),
            subject: self.subject(subject),
            body,
        };

        match self.tx.try_send(mail) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(mail)) => {
                warn!(to = %mail.to, subject = %mail.subject, "Mail queue full, message dropped");
            }
            Err(mpsc::error::TrySendError::Closed(mail)) => {
                error!(to = %mail.to, subject = %mail.subject, "Mail queue closed, message dropped");
            }
        }
    }

    pub fn send_activation_link(&self, invite: &UserInvite) {
        let link = format!("{}/activate-account/{}", self.base_url, invite.hash);
        let body = format!(
            "Hello {},\n\n\
             {} invited you to join as '{}'.\n\
             Open the following link to choose a password and activate your account:\n\n\
             {link}\n",
            invite.display_name, invite.created_by.display_name, invite.username
        );
        self.enqueue(&invite.email, "Activate your account", body);
    }

    pub fn send_password_reset_link(&self, user: &User, token: &Token) {
        let link = format!("{}/reset-password/{}", self.base_url, token.hash);
        let body = format!(
            "Hello {},\n\n\
             somebody requested a password reset for your account '{}'.\n\
             The following link is valid for one hour:\n\n\
             {link}\n\n\
             If you did not request this, ignore this message.\n",
            user.display_name, user.username
        );
        self.enqueue(&user.email, "Password reset", body);
    }

    pub fn send_password_change_confirmation(&self, user: &User) {
        let body = format!(
            "Hello {},\n\n\
             the password of your account '{}' has been changed.\n\
             If you did not do this, contact an administrator immediately.\n",
            user.display_name, user.username
        );
        self.enqueue(&user.email, "Your password has been changed", body);
    }
}
