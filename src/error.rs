use thiserror::Error;

/// Errors that can occur while following the access log
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when sending alerts
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),

    #[error("Webhook rejected notification with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
