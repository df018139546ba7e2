//! RPC instrumentation middleware.
//!
//! Observability for a service framework's RPC and messaging paths, applied
//! as interceptors around client calls, server handlers and message
//! subscribers:
//!
//! - Latency histograms per endpoint, split by outcome bucket
//!   (`success`, `bad`, `dropped`, `errors`)
//! - Structured pre/post call log events
//! - `X-Trace-Id` propagation across nested calls
//!
//! # Architecture
//!
//! ```text
//! terminal call ─► InterceptorChain
//!                  ├── TraceLayer     (ensures X-Trace-Id)
//!                  ├── LogLayer       (pre/post events)
//!                  └── MetricsLayer   (classify ─► StatsTable ─► MetricsSink)
//! ```
//!
//! Interceptors are `tower` layers. They observe a call and return its
//! result unchanged; instrumentation failures never reach the caller.
//!
//! # Modules
//!
//! - [`outcome`] - Classify a result into an outcome bucket
//! - [`stats`] - Per-endpoint histogram table
//! - [`middleware`] - Metrics, log and trace interceptors
//! - [`chain`] - Ordered interceptor composition
//! - [`broker`] - Broker capability and its metrics/log wrappers
//! - [`grpc`] - tonic status mapping, trace interceptor and metadata bridge
//! - [`observability`] - `metrics` facade sink and Prometheus setup
//! - [`config`] - Configuration from environment

#![warn(clippy::pedantic)]

pub mod broker;
pub mod call;
pub mod chain;
pub mod config;
pub mod context;
pub mod grpc;
pub mod middleware;
pub mod observability;
pub mod outcome;
pub mod stats;

pub use call::{Call, Publication, Request};
pub use chain::InterceptorChain;
pub use config::MiddlewareConfig;
pub use context::{CallContext, Metadata, TRACE_ID_HEADER};
pub use middleware::{ensure_trace_id, LogLayer, MetricsLayer, TraceLayer};
pub use outcome::{classify, classify_with, HasStatusCode, Outcome};
pub use stats::{Histogram, MetricsSink, StatsTable};
