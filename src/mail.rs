//! Outbound email capability.
//!
//! Callers depend on the [`Mailer`] trait only; [`SmtpMailer`] delivers
//! through an SMTP relay.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MaintenanceTicket;

/// SMTP relay configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port.
    pub smtp_port: u16,
    /// SMTP username (optional for local testing).
    pub smtp_user: Option<String>,
    /// SMTP password (optional for local testing).
    #[serde(skip_serializing)]
    pub smtp_pass: Option<String>,
    /// From email address.
    pub from_email: String,
    /// From display name.
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_user: None,
            smtp_pass: None,
            from_email: "noreply@localhost".to_string(),
            from_name: "Staybook".to_string(),
        }
    }
}

impl SmtpConfig {
    /// Applies `STAYBOOK_SMTP_*` overrides.
    pub fn apply_env(&mut self) {
        if let Some(port) = std::env::var("STAYBOOK_SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.smtp_port = port;
        }
        if let Ok(user) = std::env::var("STAYBOOK_SMTP_USER") {
            self.smtp_user = Some(user);
        }
        if let Ok(pass) = std::env::var("STAYBOOK_SMTP_PASS") {
            self.smtp_pass = Some(pass);
        }
        if let Ok(from) = std::env::var("STAYBOOK_SMTP_FROM") {
            self.from_email = from;
        }
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("from_email", &self.from_email)
            .finish()
    }
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// The message could not be built (bad address, empty body, ...).
    #[error("Failed to build email: {0}")]
    InvalidMessage(String),

    /// The outbound relay could not be reached or refused the message.
    #[error("Failed to queue email for delivery: {0}")]
    DeliveryQueue(String),
}

/// Capability to send a plain-text email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Sends email through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message, MailError> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        Message::builder()
            .from(
                from.parse()
                    .map_err(|e| MailError::InvalidMessage(format!("{}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailError::InvalidMessage(format!("{}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::InvalidMessage(e.to_string()))
    }

    /// Builds the SMTP transport.
    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let mut builder = if self.config.smtp_port == 465 {
            // Implicit TLS on 465
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| MailError::DeliveryQueue(e.to_string()))?
                .port(465)
        } else {
            // STARTTLS on 587, or plain for a local relay
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| MailError::DeliveryQueue(e.to_string()))?
                .port(self.config.smtp_port)
        };

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let email = self.build_message(to, subject, body)?;
        let transport = self.build_transport()?;

        transport
            .send(email)
            .await
            .map_err(|e| MailError::DeliveryQueue(e.to_string()))?;

        tracing::info!("Sent '{}' to {}", subject, to);
        Ok(())
    }
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("smtp_host", &self.config.smtp_host)
            .field("smtp_port", &self.config.smtp_port)
            .field("from_email", &self.config.from_email)
            .finish()
    }
}

/// Emails a maintenance ticket to the maintenance contact.
pub async fn notify_maintenance(
    mailer: &dyn Mailer,
    to: &str,
    hotel_name: &str,
    ticket: &MaintenanceTicket,
) -> Result<(), MailError> {
    let subject = format!("[{}] Maintenance: {}", hotel_name, ticket.title);
    mailer.send_email(to, &subject, &ticket.to_string()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use std::sync::Mutex;

    fn test_config() -> SmtpConfig {
        SmtpConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_user: None,
            smtp_pass: None,
            from_email: "noreply@example.com".to_string(),
            from_name: "Staybook".to_string(),
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let mailer = SmtpMailer::new(test_config());
        let result = mailer.build_message("not an address", "Hello", "Body");
        assert!(matches!(result, Err(MailError::InvalidMessage(_))));
    }

    #[test]
    fn test_build_message() {
        let mailer = SmtpMailer::new(test_config());
        assert!(mailer
            .build_message("ops@example.com", "Hello", "Body")
            .is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_delivery_error() {
        let mut config = test_config();
        config.smtp_host = "127.0.0.1".to_string();
        config.smtp_port = 9;
        let mailer = SmtpMailer::new(config);

        let result = mailer.send_email("ops@example.com", "Hello", "Body").await;
        assert!(matches!(result, Err(MailError::DeliveryQueue(_))));
    }

    #[tokio::test]
    async fn test_notify_maintenance_formats_ticket() {
        let mailer = RecordingMailer::default();
        let ticket = MaintenanceTicket::new("Broken window", Priority::High, "Night desk")
            .for_room("12");

        notify_maintenance(&mailer, "fix@example.com", "Harbor Inn", &ticket)
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "fix@example.com");
        assert_eq!(sent[0].1, "[Harbor Inn] Maintenance: Broken window");
        assert!(sent[0].2.contains("Room: 12"));
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = test_config();
        config.smtp_pass = Some("hunter2".to_string());
        let output = format!("{:?}", SmtpMailer::new(config.clone()));
        assert!(!output.contains("hunter2"));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
