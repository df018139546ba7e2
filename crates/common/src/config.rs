//! Common configuration types for rpc-middleware components.

use crate::error::InstrumentError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default log filter directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

/// Build the log filter.
///
/// A valid `env_directive` (the value of `RUST_LOG`) takes precedence over
/// `config.log_level`.
///
/// # Errors
///
/// Returns `InstrumentError::Configuration` if `config.log_level` is needed
/// and is not a valid filter directive.
pub fn log_filter(
    env_directive: Option<&str>,
    config: &ObservabilityConfig,
) -> Result<EnvFilter, InstrumentError> {
    if let Some(filter) = env_directive.and_then(|directive| EnvFilter::try_new(directive).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|e| {
        InstrumentError::Configuration(format!("Invalid log filter '{}': {e}", config.log_level))
    })
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`.
///
/// # Errors
///
/// Returns `InstrumentError::Configuration` if the filter directive is
/// invalid or a global subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), InstrumentError> {
    let env_directive = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(env_directive.as_deref(), config)?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| {
        InstrumentError::Configuration(format!("Failed to install tracing subscriber: {e}"))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_observability_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_log_filter_uses_config_level() {
        let config = ObservabilityConfig {
            log_level: "rpc.middleware.log=debug".to_string(),
            json_logs: false,
        };
        let filter = log_filter(None, &config).unwrap();
        assert_eq!(filter.to_string(), "rpc.middleware.log=debug");
    }

    #[test]
    fn test_log_filter_prefers_valid_env_directive() {
        let config = ObservabilityConfig::default();
        let filter = log_filter(Some("warn"), &config).unwrap();
        assert_eq!(filter.to_string(), "warn");

        // An unparsable RUST_LOG falls back to the configured level
        let filter = log_filter(Some("greeter=loudest"), &config).unwrap();
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn test_log_filter_rejects_invalid_level() {
        let config = ObservabilityConfig {
            log_level: "greeter=loudest".to_string(),
            json_logs: false,
        };
        let err = log_filter(None, &config).unwrap_err();
        assert!(matches!(err, InstrumentError::Configuration(_)));
        assert!(err.to_string().contains("greeter=loudest"));
    }

    #[test]
    fn test_init_tracing_installs_once() {
        let config = ObservabilityConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(matches!(
            init_tracing(&config),
            Err(InstrumentError::Configuration(_))
        ));
    }
}
