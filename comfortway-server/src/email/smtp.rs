//! SMTP email sender

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::EmailSender;

/// SMTP relay settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    /// 465 for implicit TLS
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .finish_non_exhaustive()
    }
}

impl SmtpConfig {
    /// Read `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM_EMAIL`
    /// and optionally `SMTP_PORT` (default 465) and `SMTP_FROM_NAME`.
    ///
    /// Returns `None` unless all required variables are set.
    pub fn from_env() -> Option<Self> {
        fn non_empty(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        Some(Self {
            host: non_empty("SMTP_HOST")?,
            port: non_empty("SMTP_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(465),
            username: non_empty("SMTP_USERNAME")?,
            password: non_empty("SMTP_PASSWORD")?,
            from_email: non_empty("SMTP_FROM_EMAIL")?,
            from_name: non_empty("SMTP_FROM_NAME"),
        })
    }
}

/// Sends sign-in links through an SMTP relay
pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from: String,
}

impl SmtpEmailSender {
    pub fn new(config: SmtpConfig) -> Result<Self, String> {
        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        transport
            .test_connection()
            .map_err(|e| format!("SMTP connection test failed: {}", e))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP connection established");

        let from = match config.from_name {
            Some(name) => format!("{} <{}>", name, config.from_email),
            None => config.from_email,
        };

        Ok(Self { transport, from })
    }
}

impl EmailSender for SmtpEmailSender {
    fn send_sign_in_link(&self, email: &str, link: &str) -> Result<(), String> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {}", e))?,
            )
            .to(email
                .parse()
                .map_err(|e| format!("Invalid to address: {}", e))?)
            .subject("Sign in to Comfort Way")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Use the link below to sign in:\n\n{}\n\n\
                 The link can be used once and expires shortly.\n\
                 If you didn't request it, you can ignore this email.",
                link
            ))
            .map_err(|e| format!("Failed to build email: {}", e))?;

        self.transport
            .send(&message)
            .map_err(|e| format!("Failed to send email: {}", e))?;

        tracing::info!(email = %email, "Sign-in link emailed");
        Ok(())
    }
}
