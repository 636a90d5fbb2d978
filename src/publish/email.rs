//! Email sink — fire-and-forget digest delivery over SMTP.

use std::time::Duration;

use chrono::Utc;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::config::EmailSettings;
use crate::error::EmailError;

pub struct EmailSink {
    settings: EmailSettings,
    password: SecretString,
    timeout: Duration,
}

impl EmailSink {
    pub fn new(settings: EmailSettings, password: SecretString, timeout: Duration) -> Self {
        Self {
            settings,
            password,
            timeout,
        }
    }

    pub fn recipient(&self) -> &str {
        &self.settings.recipient
    }

    /// Subject line for the daily digest.
    pub fn digest_subject() -> String {
        format!("Your Daily Reading List - {}", Utc::now().format("%d %b %Y"))
    }

    /// Send one message. No read-back; success means the relay accepted it.
    pub async fn send(&self, subject: &str, body: &str) -> Result<(), EmailError> {
        let settings = self.settings.clone();
        let password = self.password.expose_secret().to_string();
        let timeout = self.timeout;
        let subject = subject.to_string();
        let body = body.to_string();
        let recipient = settings.recipient.clone();

        // lettre's SMTP transport is blocking; keep it off the reactor.
        tokio::task::spawn_blocking(move || send_blocking(&settings, password, timeout, &subject, &body))
            .await
            .map_err(|e| EmailError::Unavailable {
                recipient,
                reason: format!("send task failed: {e}"),
            })?
    }
}

fn send_blocking(
    settings: &EmailSettings,
    password: String,
    timeout: Duration,
    subject: &str,
    body: &str,
) -> Result<(), EmailError> {
    let unavailable = |reason: String| EmailError::Unavailable {
        recipient: settings.recipient.clone(),
        reason,
    };

    let email = Message::builder()
        .from(
            settings
                .from_address
                .parse()
                .map_err(|e| unavailable(format!("invalid from address: {e}")))?,
        )
        .to(settings
            .recipient
            .parse()
            .map_err(|e| unavailable(format!("invalid recipient address: {e}")))?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| unavailable(format!("failed to build email: {e}")))?;

    let creds = Credentials::new(settings.username.clone(), password);
    let transport = SmtpTransport::relay(&settings.smtp_host)
        .map_err(|e| unavailable(format!("SMTP relay error: {e}")))?
        .port(settings.smtp_port)
        .credentials(creds)
        .timeout(Some(timeout))
        .build();

    transport
        .send(&email)
        .map_err(|e| unavailable(format!("SMTP send failed: {e}")))?;

    tracing::info!(recipient = %settings.recipient, "Email sent");
    Ok(())
}
