//! `metrics` crate backend.
//!
//! [`FacadeSink`] hands out histograms from whatever recorder is installed
//! for the `metrics` facade. In production that is the Prometheus recorder
//! installed by [`init_metrics_recorder`]; in tests it can be a
//! `metrics_util::debugging::DebuggingRecorder`.
//!
//! Histogram names keep their dotted form (`service.request.Greeter.Hello.bad`);
//! the Prometheus exporter rewrites characters that are invalid in
//! Prometheus names to `_` at render time.

use crate::config::MiddlewareConfig;
use crate::stats::{Histogram, MetricsSink};
use common::error::InstrumentError;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

/// Latency buckets in seconds, scaled to the configured unit at install time.
const LATENCY_BUCKETS_SECONDS: [f64; 12] = [
    0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
];

/// Metrics sink backed by the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeSink;

impl FacadeSink {
    /// Create a facade sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MetricsSink for FacadeSink {
    fn histogram(&self, name: &str) -> Result<Arc<dyn Histogram>, InstrumentError> {
        Ok(Arc::new(metrics::histogram!(name.to_string())))
    }
}

impl Histogram for metrics::Histogram {
    #[allow(clippy::cast_precision_loss)] // samples are latencies, far below 2^52
    fn record(&self, value: u64) {
        metrics::Histogram::record(self, value as f64);
    }
}

/// Bucket boundaries for latencies recorded in `unit`s.
#[must_use]
pub fn latency_buckets(unit: Duration) -> Vec<f64> {
    let unit_seconds = unit.as_secs_f64();
    if unit_seconds == 0.0 {
        return LATENCY_BUCKETS_SECONDS.to_vec();
    }
    LATENCY_BUCKETS_SECONDS
        .iter()
        .map(|bound| bound / unit_seconds)
        .collect()
}

/// Prometheus builder with latency buckets set for every configured
/// metric name.
///
/// # Errors
///
/// Returns error if a bucket set is rejected.
pub fn prometheus_builder(config: &MiddlewareConfig) -> Result<PrometheusBuilder, InstrumentError> {
    let buckets = latency_buckets(config.unit);
    let mut builder = PrometheusBuilder::new();

    for metric in [
        &config.request_metric,
        &config.call_metric,
        &config.subscribe_metric,
        &config.publish_metric,
    ] {
        builder = builder
            .set_buckets_for_metric(Matcher::Prefix(metric.clone()), &buckets)
            .map_err(|e| {
                InstrumentError::Configuration(format!(
                    "Failed to set buckets for {metric}: {e}"
                ))
            })?;
    }

    Ok(builder)
}

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any interceptor records, otherwise early samples
/// go to the no-op recorder.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder(
    config: &MiddlewareConfig,
) -> Result<PrometheusHandle, InstrumentError> {
    prometheus_builder(config)?.install_recorder().map_err(|e| {
        InstrumentError::Configuration(format!("Failed to install Prometheus recorder: {e}"))
    })
}
