//! Observability backends.
//!
//! The interceptors only depend on [`crate::stats::MetricsSink`]; this
//! module supplies the production sink over the `metrics` facade and the
//! Prometheus exporter setup.

pub mod metrics;

pub use metrics::{init_metrics_recorder, prometheus_builder, FacadeSink};
