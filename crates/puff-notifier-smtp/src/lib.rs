// # SMTP Notifier
//
// This crate delivers Puff notification batches as one HTML email per batch.
//
// ## Transport Selection
//
// The port decides how the connection is secured:
// - `25`: plain SMTP, no authentication
// - `465`: implicit TLS (SMTPS)
// - anything else (usually `587`): STARTTLS
//
// ## Environment
//
// [`SmtpConfig::from_env`] reads `PUFF_SMTP_SERVER`, `PUFF_SMTP_PORT`,
// `PUFF_SMTP_USERNAME`, `PUFF_SMTP_PASSWORD` and `PUFF_RECIPIENT_EMAIL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use puff_core::traits::{DomainNotification, NotificationDispatcher};
use puff_core::{Error, Result};

/// Subject line of every notification email
pub const SUBJECT: &str = "Domain status change";

/// Default submission port
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP dispatcher configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server host name
    pub server: String,

    /// SMTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login name, also used as the sender address unless `from` is set
    pub username: String,

    /// Login password
    #[serde(default)]
    pub password: String,

    /// Address every notification is sent to
    pub recipient: String,

    /// Sender address override
    #[serde(default)]
    pub from: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("recipient", &self.recipient)
            .field("from", &self.from)
            .finish()
    }
}

impl SmtpConfig {
    /// Read the configuration from `PUFF_SMTP_*` environment variables
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: `PUFF_SMTP_SERVER` is unset or empty (mail disabled)
    /// - `Ok(Some(config))`: a validated configuration
    /// - `Err(Error)`: mail is enabled but the settings are unusable
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(server) = var("PUFF_SMTP_SERVER") else {
            return Ok(None);
        };

        let port = match var("PUFF_SMTP_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::config(format!("PUFF_SMTP_PORT is not a port number: '{}'", raw)))?,
            None => DEFAULT_SMTP_PORT,
        };

        let config = Self {
            server,
            port,
            username: var("PUFF_SMTP_USERNAME").unwrap_or_default(),
            password: lookup("PUFF_SMTP_PASSWORD").unwrap_or_default(),
            recipient: var("PUFF_RECIPIENT_EMAIL").unwrap_or_default(),
            from: None,
        };
        config.validate()?;
        Ok(Some(config))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::config("SMTP server must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("SMTP port must be > 0"));
        }
        if self.recipient.trim().is_empty() {
            return Err(Error::config("Recipient email must be set when SMTP is enabled"));
        }
        if self.sender().trim().is_empty() {
            return Err(Error::config("SMTP username or sender address must be set"));
        }
        self.sender_mailbox()?;
        self.recipient_mailbox()?;
        Ok(())
    }

    /// Address used in the `From` header
    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }

    fn sender_mailbox(&self) -> Result<Mailbox> {
        self.sender()
            .parse()
            .map_err(|e| Error::config(format!("Invalid sender address '{}': {}", self.sender(), e)))
    }

    fn recipient_mailbox(&self) -> Result<Mailbox> {
        self.recipient
            .parse()
            .map_err(|e| Error::config(format!("Invalid recipient address '{}': {}", self.recipient, e)))
    }
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSecurity {
    /// No TLS, no authentication
    Plain,
    /// TLS from the first byte
    ImplicitTls,
    /// Plain connection upgraded with STARTTLS
    StartTls,
}

impl TransportSecurity {
    /// Pick the security mode for a port
    pub fn for_port(port: u16) -> Self {
        match port {
            25 => Self::Plain,
            465 => Self::ImplicitTls,
            _ => Self::StartTls,
        }
    }
}

/// Notification dispatcher sending one HTML email per batch
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    security: TransportSecurity,
    body: BodyTemplate,
}

impl SmtpDispatcher {
    /// Create a dispatcher from a configuration
    ///
    /// No connection is made until the first batch is delivered.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        config.validate()?;

        let security = TransportSecurity::for_port(config.port);
        let credentials = || Credentials::new(config.username.clone(), config.password.clone());

        let transport = match security {
            TransportSecurity::Plain => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
                    .port(config.port)
                    .build()
            }
            TransportSecurity::ImplicitTls => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
                    .map_err(|e| Error::config(format!("Invalid SMTP relay '{}': {}", config.server, e)))?
                    .port(config.port);
                if !config.username.is_empty() {
                    builder = builder.credentials(credentials());
                }
                builder.build()
            }
            TransportSecurity::StartTls => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
                    .map_err(|e| Error::config(format!("Invalid SMTP relay '{}': {}", config.server, e)))?
                    .port(config.port);
                if !config.username.is_empty() {
                    builder = builder.credentials(credentials());
                }
                builder.build()
            }
        };

        debug!(
            "SMTP dispatcher for {}:{} ({:?})",
            config.server, config.port, security
        );

        Ok(Self {
            transport,
            from: config.sender_mailbox()?,
            to: config.recipient_mailbox()?,
            security,
            body: BodyTemplate::new()?,
        })
    }

    /// Connection security in use
    pub fn security(&self) -> TransportSecurity {
        self.security
    }

    fn build_message(&self, notifications: &[DomainNotification]) -> Result<Message> {
        let body = self.body.render(notifications, Utc::now())?;

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| Error::dispatch(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl NotificationDispatcher for SmtpDispatcher {
    async fn deliver(&self, notifications: &[DomainNotification]) -> Result<()> {
        let message = self.build_message(notifications)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::dispatch(format!("Failed to send email via SMTP: {}", e)))?;

        info!(
            to = %self.to,
            count = notifications.len(),
            "Notification email sent"
        );
        Ok(())
    }

    fn dispatcher_name(&self) -> &'static str {
        "smtp"
    }
}

/// Handlebars name of the email body template
const BODY_TEMPLATE_NAME: &str = "notification_html";

const BODY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .container { width: 100%; max-width: 600px; margin: 0 auto; padding: 20px; }
        .header { background-color: #161616; color: white; padding: 10px; text-align: center; }
        .content { padding: 20px; background-color: #f9f9f9; }
        .footer { text-align: center; font-size: 0.8em; color: #777; margin-top: 20px; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Domain status change</h1>
        </div>
        <div class="content">
            <p>The status of the following domains has changed:</p>
            <ul>
{{#each notifications}}
                <li>{{domain}}: {{status_label}}{{#if is_final_notice}} (final notice){{/if}}</li>
{{/each}}
            </ul>
            <p>If you are interested in these domains, act soon.</p>
            <p>Checked at: {{checked_at}}</p>
        </div>
        <div class="footer">
            <p>Sent automatically by Puff. Please do not reply.</p>
        </div>
    </div>
</body>
</html>
"#;

/// Values handed to the body template
#[derive(Serialize)]
struct BodyContext<'a> {
    notifications: &'a [DomainNotification],
    checked_at: String,
}

/// Handlebars renderer for the notification email body
///
/// Every value is HTML-escaped by the template engine.
#[derive(Debug)]
pub struct BodyTemplate {
    handlebars: Handlebars<'static>,
}

impl BodyTemplate {
    /// Compile the body template
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars
            .register_template_string(BODY_TEMPLATE_NAME, BODY_TEMPLATE)
            .map_err(|e| Error::config(format!("Failed to register email template: {}", e)))?;

        Ok(Self { handlebars })
    }

    /// Render the HTML body for a batch
    pub fn render(
        &self,
        notifications: &[DomainNotification],
        checked_at: DateTime<Utc>,
    ) -> Result<String> {
        let context = BodyContext {
            notifications,
            checked_at: checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        };

        self.handlebars
            .render(BODY_TEMPLATE_NAME, &context)
            .map_err(|e| Error::dispatch(format!("Failed to render email body: {}", e)))
    }
}
