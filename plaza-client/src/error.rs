//! Errors raised while setting up the client.
//!
//! Runtime request failures never surface here; [`crate::RestTransport`]
//! folds them into [`plaza_core::RemoteError`].

use thiserror::Error;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or PLAZA_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Client construction failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to initialize telemetry: {0}")]
    Telemetry(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
