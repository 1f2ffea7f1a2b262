use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::capabilities::MAX_TIMEOUT_MS;
pub use crate::capabilities::DEFAULT_BACKEND_URL;

pub const ENV_BACKEND_URL: &str = "H2OGUARD_BACKEND_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "H2OGUARD_REQUEST_TIMEOUT_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "H2OGUARD_CONNECT_TIMEOUT_MS";
pub const ENV_RETRY_ATTEMPTS: &str = "H2OGUARD_RETRY_ATTEMPTS";
pub const ENV_DB_PATH: &str = "H2OGUARD_DB_PATH";
pub const ENV_LOG: &str = "H2OGUARD_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let ms = self
            .base_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend_base_url: Url,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub database_path: PathBuf,
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_base_url: default_backend_url(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            database_path: PathBuf::from("h2oguard.sqlite3"),
            log_filter: "info".to_string(),
        }
    }
}

fn default_backend_url() -> Url {
    match Url::parse(DEFAULT_BACKEND_URL) {
        Ok(url) => url,
        Err(_) => unreachable!("default backend URL is a valid literal"),
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidVar {
        var,
        reason: e.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
        var,
        reason: e.to_string(),
    })
}

impl ClientConfig {
    /// Defaults overridden by `H2OGUARD_*` variables, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_BACKEND_URL) {
            config.backend_base_url = parse_url(ENV_BACKEND_URL, &v)?;
        }
        if let Some(v) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout_ms = parse_number(ENV_REQUEST_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            config.connect_timeout_ms = parse_number(ENV_CONNECT_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_RETRY_ATTEMPTS) {
            config.retry.max_attempts = parse_number(ENV_RETRY_ATTEMPTS, &v)?;
        }
        if let Some(v) = lookup(ENV_DB_PATH) {
            config.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_LOG) {
            config.log_filter = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.backend_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(
                "backend_base_url must use http or https".into(),
            ));
        }
        if self.backend_base_url.cannot_be_a_base() || self.backend_base_url.host().is_none() {
            return Err(ConfigError::Validation(
                "backend_base_url must include a host".into(),
            ));
        }
        if self.backend_base_url.query().is_some() || self.backend_base_url.fragment().is_some() {
            return Err(ConfigError::Validation(
                "backend_base_url must not carry a query or fragment".into(),
            ));
        }
        if !(1..=MAX_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Validation(format!(
                "request_timeout_ms must be within 1..={MAX_TIMEOUT_MS}"
            )));
        }
        if !(1..=MAX_TIMEOUT_MS).contains(&self.connect_timeout_ms) {
            return Err(ConfigError::Validation(format!(
                "connect_timeout_ms must be within 1..={MAX_TIMEOUT_MS}"
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation("retry.max_attempts must be > 0".into()));
        }
        if self.retry.base_backoff_ms == 0 {
            return Err(ConfigError::Validation("retry.base_backoff_ms must be > 0".into()));
        }
        if self.retry.max_backoff_ms < self.retry.base_backoff_ms {
            return Err(ConfigError::Validation(
                "retry.max_backoff_ms must be >= base_backoff_ms".into(),
            ));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("database_path must not be empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
