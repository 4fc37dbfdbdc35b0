//! Plaza client plumbing: the REST [`Transport`](plaza_core::Transport),
//! auth token storage, TOML configuration and tracing setup.
//!
//! ```ignore
//! let config = ClientConfig::load()?;
//! init_tracing(&config.telemetry)?;
//! let transport = RestTransport::from_config(&config)?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod rest;
pub mod telemetry;

pub use auth::{InMemoryTokenStore, TokenStore};
pub use config::{
    AuthConfig, ClientConfig, LogFormat, RefetchConfig, TelemetryConfig, CONFIG_ENV_VAR,
    DEFAULT_LOG_FILTER,
};
pub use error::{ClientError, ClientResult, ConfigError};
pub use rest::{normalize_error_body, parse_success_body, RestTransport};
pub use telemetry::{env_filter, init_tracing};
