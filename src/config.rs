//! Runtime configuration
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables. Every field has a default, so an empty file and an
//! empty environment both yield a usable configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
pub const ENV_ERROR_RATE_THRESHOLD: &str = "ERROR_RATE_THRESHOLD";
pub const ENV_WINDOW_SIZE: &str = "WINDOW_SIZE";
pub const ENV_ALERT_COOLDOWN: &str = "ALERT_COOLDOWN_SEC";
pub const ENV_MAINTENANCE_MODE: &str = "MAINTENANCE_MODE";
pub const ENV_DEPLOYMENT_OWNER: &str = "DEPLOYMENT_OWNER";
pub const ENV_ENVIRONMENT_NAME: &str = "ENVIRONMENT_NAME";
pub const ENV_LOG_FILE: &str = "LOG_FILE";
pub const ENV_WEBHOOK_TIMEOUT: &str = "WEBHOOK_TIMEOUT_SEC";
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL_MS";

/// Longest accepted alert cooldown (30 days)
pub const MAX_ALERT_COOLDOWN_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Watcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Incoming webhook endpoint; empty disables delivery
    pub slack_webhook_url: String,
    /// 5xx percentage (0-100) that must be exceeded to alert
    pub error_rate_threshold: f64,
    /// Number of most recent requests the error rate covers
    pub window_size: usize,
    /// Minimum seconds between two alerts of the same category
    pub alert_cooldown_seconds: u64,
    /// Drop all notifications locally while detection keeps running
    pub maintenance_mode: bool,
    pub deployment_owner: String,
    pub environment_name: String,
    /// Access log to follow
    pub log_file: PathBuf,
    /// Upper bound for one webhook request
    pub webhook_timeout_seconds: u64,
    /// How often the tailer polls for new data
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slack_webhook_url: String::new(),
            error_rate_threshold: 2.0,
            window_size: 200,
            alert_cooldown_seconds: 300,
            maintenance_mode: false,
            deployment_owner: "Unknown".to_string(),
            environment_name: "Production".to_string(),
            log_file: PathBuf::from("/var/log/nginx/access.log"),
            webhook_timeout_seconds: 10,
            poll_interval_ms: 250,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing keys take their default values. The result is not validated;
    /// call [`Config::validate`] after applying overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read and
    /// `ConfigError::TomlError` if it is not valid TOML for this structure.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Build configuration from the process environment over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup over the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Apply environment-style overrides
    ///
    /// Keys absent from `lookup` keep their current value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` naming the key when a numeric value
    /// cannot be parsed.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_WEBHOOK_URL) {
            self.slack_webhook_url = url;
        }
        if let Some(value) = lookup(ENV_ERROR_RATE_THRESHOLD) {
            self.error_rate_threshold = parse_value(ENV_ERROR_RATE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_WINDOW_SIZE) {
            self.window_size = parse_value(ENV_WINDOW_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_ALERT_COOLDOWN) {
            self.alert_cooldown_seconds = parse_value(ENV_ALERT_COOLDOWN, &value)?;
        }
        if let Some(value) = lookup(ENV_MAINTENANCE_MODE) {
            self.maintenance_mode = value.to_lowercase() == "true";
        }
        if let Some(owner) = lookup(ENV_DEPLOYMENT_OWNER) {
            self.deployment_owner = owner;
        }
        if let Some(name) = lookup(ENV_ENVIRONMENT_NAME) {
            self.environment_name = name;
        }
        if let Some(path) = lookup(ENV_LOG_FILE) {
            self.log_file = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_WEBHOOK_TIMEOUT) {
            self.webhook_timeout_seconds = parse_value(ENV_WEBHOOK_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL) {
            self.poll_interval_ms = parse_value(ENV_POLL_INTERVAL, &value)?;
        }
        Ok(self)
    }

    /// Check that all values are usable
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "window_size must be greater than 0".to_string(),
            ));
        }
        if !self.error_rate_threshold.is_finite()
            || !(0.0..=100.0).contains(&self.error_rate_threshold)
        {
            return Err(ConfigError::ValidationError(format!(
                "error_rate_threshold must be between 0 and 100, got {}",
                self.error_rate_threshold
            )));
        }
        if self.alert_cooldown_seconds > MAX_ALERT_COOLDOWN_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "alert_cooldown_seconds must be at most {}, got {}",
                MAX_ALERT_COOLDOWN_SECONDS, self.alert_cooldown_seconds
            )));
        }
        if self.webhook_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "webhook_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Webhook endpoint, `None` when delivery is not configured
    pub fn webhook_endpoint(&self) -> Option<&str> {
        let url = self.slack_webhook_url.trim();
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }

    /// Minimum time between two alerts of the same category
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the cooldown does not fit a
    /// signed duration. [`Config::validate`] rejects such values up front.
    pub fn cooldown(&self) -> Result<chrono::Duration, ConfigError> {
        i64::try_from(self.alert_cooldown_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "alert_cooldown_seconds out of range: {}",
                    self.alert_cooldown_seconds
                ))
            })
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ParseError(format!("{} has invalid value '{}'", key, value)))
}
