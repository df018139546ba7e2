//! Common error types for rpc-middleware components.

use thiserror::Error;

/// Type-erased error used where producers share no common error type
/// (broker handlers, transport adapters).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the instrumentation layer itself.
///
/// These never reach the caller of a wrapped operation. They are logged and
/// discarded at the point where instrumentation would otherwise fail.
#[derive(Error, Debug)]
pub enum InstrumentError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The metrics sink refused to hand out a histogram
    #[error("Metrics sink error: {0}")]
    Sink(String),
}
