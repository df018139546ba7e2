//! Middleware configuration.
//!
//! Configuration is loaded from environment variables. Every setting has a
//! default, so an empty environment yields a usable configuration.

use common::config::{ObservabilityConfig, DEFAULT_LOG_LEVEL};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default recording unit for latency histograms.
pub const DEFAULT_UNIT: Duration = Duration::from_millis(1);

/// Default metric name for server handler latency.
pub const DEFAULT_REQUEST_METRIC: &str = "service.request";

/// Default metric name for outbound client call latency.
pub const DEFAULT_CALL_METRIC: &str = "service.call";

/// Default metric name for subscriber handling latency.
pub const DEFAULT_SUBSCRIBE_METRIC: &str = "service.subscribe";

/// Default metric name for broker publish latency.
pub const DEFAULT_PUBLISH_METRIC: &str = "service.publish";

/// Middleware configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareConfig {
    /// Unit latency samples are converted into before recording (default: 1ms).
    pub unit: Duration,

    /// Base metric name for server handlers (default: "service.request").
    pub request_metric: String,

    /// Base metric name for client calls (default: "service.call").
    pub call_metric: String,

    /// Base metric name for subscribers (default: "service.subscribe").
    pub subscribe_metric: String,

    /// Base metric name for broker publishes (default: "service.publish").
    pub publish_metric: String,

    /// Log level and format.
    pub observability: ObservabilityConfig,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            unit: DEFAULT_UNIT,
            request_metric: DEFAULT_REQUEST_METRIC.to_string(),
            call_metric: DEFAULT_CALL_METRIC.to_string(),
            subscribe_metric: DEFAULT_SUBSCRIBE_METRIC.to_string(),
            publish_metric: DEFAULT_PUBLISH_METRIC.to_string(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl MiddlewareConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable settings.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let unit = match vars.get("RPC_METRICS_UNIT") {
            Some(value) => parse_unit(value)?,
            None => DEFAULT_UNIT,
        };

        let metric_name = |key: &str, default: &str| -> Result<String, ConfigError> {
            match vars.get(key) {
                Some(name) if name.trim().is_empty() => Err(ConfigError::InvalidValue(format!(
                    "{key} must not be empty"
                ))),
                Some(name) => Ok(name.trim().to_string()),
                None => Ok(default.to_string()),
            }
        };

        let json_logs = match vars.get("RPC_LOG_JSON").map(String::as_str) {
            None => false,
            Some("1" | "true" | "TRUE" | "yes") => true,
            Some("0" | "false" | "FALSE" | "no") => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "RPC_LOG_JSON must be a boolean, got '{other}'"
                )))
            }
        };

        let log_level = vars
            .get("RPC_LOG_LEVEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            unit,
            request_metric: metric_name("RPC_METRICS_REQUEST_NAME", DEFAULT_REQUEST_METRIC)?,
            call_metric: metric_name("RPC_METRICS_CALL_NAME", DEFAULT_CALL_METRIC)?,
            subscribe_metric: metric_name("RPC_METRICS_SUBSCRIBE_NAME", DEFAULT_SUBSCRIBE_METRIC)?,
            publish_metric: metric_name("RPC_METRICS_PUBLISH_NAME", DEFAULT_PUBLISH_METRIC)?,
            observability: ObservabilityConfig {
                log_level,
                json_logs,
            },
        })
    }
}

/// Parse a recording unit: `ns`, `us`, `ms` or `s`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for anything else.
pub fn parse_unit(value: &str) -> Result<Duration, ConfigError> {
    match value.trim() {
        "ns" => Ok(Duration::from_nanos(1)),
        "us" | "µs" => Ok(Duration::from_micros(1)),
        "ms" => Ok(Duration::from_millis(1)),
        "s" => Ok(Duration::from_secs(1)),
        other => Err(ConfigError::InvalidValue(format!(
            "RPC_METRICS_UNIT must be one of ns, us, ms, s; got '{other}'"
        ))),
    }
}
