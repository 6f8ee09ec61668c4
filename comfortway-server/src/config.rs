//! Server configuration

use anyhow::{bail, Context, Result};
use comfortway_core::link::DEFAULT_LINK_VALIDITY_MINUTES;
use comfortway_core::session::DEFAULT_SESSION_VALIDITY_HOURS;

use crate::crypto::BCRYPT_COST;
use crate::email::SmtpConfig;
use crate::provider::IdentityProviderConfig;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3901;

/// Browser origins allowed when `CORS_ORIGINS` is unset
pub const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "https://comfort-way.vercel.app",
    "https://comfortway.in",
];

#[derive(Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// External base URL used in email-link callbacks
    pub public_base_url: String,

    /// HS256 secret for session and link tokens
    pub jwt_secret: String,

    pub session_ttl_hours: i64,

    /// Link validity, also the age at which link records are purged
    pub email_link_ttl_minutes: i64,

    /// Password logins yield unverified sessions until an email link is redeemed
    pub require_email_link_2fa: bool,

    /// SQLite file; the in-memory store is used when unset
    pub database_path: Option<String>,

    pub bcrypt_cost: u32,

    pub cors_origins: Vec<String>,

    pub identity_provider: IdentityProviderConfig,

    /// Console delivery when unset
    pub smtp: Option<SmtpConfig>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("public_base_url", &self.public_base_url)
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("email_link_ttl_minutes", &self.email_link_ttl_minutes)
            .field("require_email_link_2fa", &self.require_email_link_2fa)
            .field("database_path", &self.database_path)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("cors_origins", &self.cors_origins)
            .field("identity_provider", &self.identity_provider)
            .field("smtp", &self.smtp)
            .finish()
    }
}

impl Config {
    /// Defaults for everything but the signing secret
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
            jwt_secret: jwt_secret.into(),
            session_ttl_hours: DEFAULT_SESSION_VALIDITY_HOURS,
            email_link_ttl_minutes: DEFAULT_LINK_VALIDITY_MINUTES,
            require_email_link_2fa: false,
            database_path: None,
            bcrypt_cost: BCRYPT_COST,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            identity_provider: IdentityProviderConfig::default(),
            smtp: None,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Only `JWT_SECRET` is required.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = non_empty("JWT_SECRET").context("JWT_SECRET must be set")?;
        let mut config = Self::new(jwt_secret);

        if let Some(port) = non_empty("PORT") {
            config.port = port.parse().context("PORT must be a port number")?;
            config.public_base_url = format!("http://localhost:{}", config.port);
        }
        if let Some(url) = non_empty("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(hours) = non_empty("SESSION_TTL_HOURS") {
            config.session_ttl_hours = positive(&hours, "SESSION_TTL_HOURS")?;
        }
        if let Some(minutes) = non_empty("EMAIL_LINK_TTL_MINUTES") {
            config.email_link_ttl_minutes = positive(&minutes, "EMAIL_LINK_TTL_MINUTES")?;
        }
        if let Some(flag) = non_empty("REQUIRE_EMAIL_LINK_2FA") {
            config.require_email_link_2fa = parse_flag(&flag)
                .with_context(|| format!("REQUIRE_EMAIL_LINK_2FA: unrecognised value {:?}", flag))?;
        }
        if let Some(cost) = non_empty("BCRYPT_COST") {
            config.bcrypt_cost = cost.parse().context("BCRYPT_COST must be a number")?;
            if !(4..=31).contains(&config.bcrypt_cost) {
                bail!("BCRYPT_COST must be between 4 and 31");
            }
        }
        if let Some(origins) = non_empty("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config.database_path = non_empty("DATABASE_PATH");
        config.identity_provider = IdentityProviderConfig::from_env();
        config.smtp = SmtpConfig::from_env();

        Ok(config)
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn positive(value: &str, key: &str) -> Result<i64> {
    let n: i64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number", key))?;
    if n <= 0 {
        bail!("{} must be positive", key);
    }
    Ok(n)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
