use crate::config::EmailConfig;
use crate::error::{AppError, Result};
use crate::notifications::Notifier;
use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;
use tracing::{error, info};

const SMTP_PORT: u16 = 25;
const SMTPS_PORT: u16 = 465;

/// Parsed `smtp://host[:port]` or `smtps://host[:port]` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SmtpEndpoint {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) implicit_tls: bool,
}

impl SmtpEndpoint {
    pub(crate) fn parse(endpoint: &str) -> Result<Self> {
        let (implicit_tls, rest) = if let Some(rest) = endpoint.strip_prefix("smtps://") {
            (true, rest)
        } else if let Some(rest) = endpoint.strip_prefix("smtp://") {
            (false, rest)
        } else if endpoint.contains("://") {
            return Err(AppError::Configuration(format!(
                "Unsupported SMTP scheme in '{}'",
                endpoint
            )));
        } else {
            (false, endpoint)
        };

        let authority = rest.trim_end_matches('/');
        let default_port = if implicit_tls { SMTPS_PORT } else { SMTP_PORT };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    AppError::Configuration(format!("Invalid SMTP port in '{}'", endpoint))
                })?;
                (host, port)
            }
            None => (authority, default_port),
        };

        if host.is_empty() {
            return Err(AppError::Configuration(format!(
                "Missing SMTP host in '{}'",
                endpoint
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            implicit_tls,
        })
    }
}

/// Email notification sender
#[derive(Clone)]
pub struct EmailSender {
    pub(crate) endpoint: SmtpEndpoint,
    pub(crate) smtp_username: Option<String>,
    pub(crate) smtp_password: Option<String>,
    pub(crate) use_tls: bool,
    pub(crate) from: Mailbox,
    pub(crate) to: Mailbox,
    pub(crate) subject_prefix: String,
    pub(crate) timeout: Duration,
}

impl EmailSender {
    /// Build a sender from configuration.
    ///
    /// Returns `None` when no recipient or no SMTP endpoint is configured,
    /// which disables email notifications entirely.
    pub fn from_config(config: &EmailConfig, timeout: Duration) -> Result<Option<Self>> {
        if config.to.is_empty() || config.smtp.is_empty() {
            return Ok(None);
        }

        let endpoint = SmtpEndpoint::parse(&config.smtp)?;

        let from_address = config
            .from
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid from address '{}': {}", config.from, e)))?;
        let name = (!config.name.is_empty()).then(|| config.name.clone());
        let from = Mailbox::new(name, from_address);

        let to = config
            .to
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid recipient address '{}': {}", config.to, e)))?;

        Ok(Some(Self {
            endpoint,
            smtp_username: (!config.username.is_empty()).then(|| config.username.clone()),
            smtp_password: (!config.password.is_empty()).then(|| config.password.clone()),
            use_tls: config.use_ssl,
            from,
            to,
            subject_prefix: config.subject.clone(),
            timeout,
        }))
    }

    /// Full subject line with the configured prefix
    pub(crate) fn full_subject(&self, subject: &str) -> String {
        if self.subject_prefix.is_empty() {
            subject.to_string()
        } else {
            format!("{}: {}", self.subject_prefix, subject)
        }
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.full_subject(subject))
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn build_transport(&self) -> Result<SmtpTransport> {
        let host = self.endpoint.host.as_str();

        let builder = if self.endpoint.implicit_tls {
            SmtpTransport::relay(host)
                .map_err(|e| AppError::Configuration(format!("Invalid SMTP server: {}", e)))?
        } else if self.use_tls {
            SmtpTransport::starttls_relay(host)
                .map_err(|e| AppError::Configuration(format!("Invalid SMTP server: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(host)
        };

        let mut builder = builder
            .port(self.endpoint.port)
            .timeout(Some(self.timeout));

        if let (Some(user), Some(pass)) = (&self.smtp_username, &self.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailSender {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(subject, body)?;
        let mailer = self.build_transport()?;

        let result = tokio::task::spawn_blocking(move || {
            mailer
                .send(&message)
                .map(|_| ())
                .map_err(|e| AppError::dispatch("notify", format!("Failed to send email: {}", e)))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?;

        match result {
            Ok(()) => {
                info!(to = %self.to, subject = %subject, "Email notification sent");
                Ok(())
            }
            Err(e) => {
                error!(to = %self.to, error = %e, "Failed to send email notification");
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "email"
    }
}
