//! Interceptors for client calls, server handlers and subscribers.
//!
//! Every interceptor is a `tower::Layer` whose service forwards the request
//! to the wrapped operation and returns its response and error unchanged:
//!
//! - [`metrics`] - per-endpoint latency by outcome bucket
//! - [`logging`] - structured pre/post call events
//! - [`trace`] - `X-Trace-Id` propagation
//!
//! Layers compose with `tower::ServiceBuilder` or [`crate::chain::InterceptorChain`].
//! The outermost layer observes the longest elapsed time, since it brackets
//! every layer inside it.

pub mod logging;
pub mod metrics;
pub mod trace;

use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by interceptor services.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

pub use logging::{LogLayer, LogService, Side};
pub use metrics::{MetricsLayer, MetricsService};
pub use trace::{ensure_trace_id, TraceLayer, TraceService};
