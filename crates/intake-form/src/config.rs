use std::env;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

/// Collector the public site posts applications to.
pub const DEFAULT_WEBHOOK_URL: &str =
    "https://primary-production-56087.up.railway.app/webhook/i-am-lender";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime settings for the intake client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    pub webhook_url: String,
    pub timeout: Duration,
    /// Reported as `pageUrl` on every submission when set.
    pub page_url: Option<String>,
    pub log_level: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            webhook_url: DEFAULT_WEBHOOK_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl IntakeConfig {
    /// Reads `INTAKE_*` variables, loading a `.env` file first when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let webhook_url = lookup("INTAKE_WEBHOOK_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.webhook_url);
        check_webhook_url(&webhook_url)?;

        let timeout = match lookup("INTAKE_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => defaults.timeout,
        };

        let page_url = lookup("INTAKE_PAGE_URL").filter(|value| !value.trim().is_empty());
        let log_level = lookup("INTAKE_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            webhook_url,
            timeout,
            page_url,
            log_level,
        })
    }

    /// Replaces the webhook, re-checking the URL.
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        check_webhook_url(&url)?;
        self.webhook_url = url;
        Ok(self)
    }
}

fn check_webhook_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidWebhookUrl {
        value: raw.to_string(),
        reason: source.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidWebhookUrl {
            value: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid webhook url '{value}': {reason}")]
    InvalidWebhookUrl { value: String, reason: String },
    #[error("INTAKE_TIMEOUT_SECS must be a positive number of seconds, got '{0}'")]
    InvalidTimeout(String),
}
