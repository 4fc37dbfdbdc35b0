//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, TelemetryConfig};
use crate::error::ClientError;

/// Build the filter: `RUST_LOG` when set, otherwise the configured directives.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, ClientError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            ClientError::Telemetry(format!("invalid filter '{}': {}", config.filter, e))
        }),
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails with [`ClientError::Telemetry`]
/// because a global subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), ClientError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| ClientError::Telemetry(format!("failed to init subscriber: {e}")))?;

    tracing::info!(filter = %config.filter, format = ?config.format, "Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            filter: "plaza=notalevel".to_string(),
            format: LogFormat::Json,
        };
        assert!(matches!(env_filter(&config), Err(ClientError::Telemetry(_))));
    }

    #[test]
    fn test_init_twice_fails() {
        let config = TelemetryConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(ClientError::Telemetry(_))));
    }
}
