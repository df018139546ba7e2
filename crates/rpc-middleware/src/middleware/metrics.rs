//! Latency/outcome metrics interceptor.
//!
//! Times the wrapped operation, classifies its result and records the
//! latency into the endpoint stats table. The result is returned to the
//! caller untouched.
//!
//! Each `layer()` call creates a fresh [`StatsTable`]; clones of the
//! resulting service share it.

use super::BoxFuture;
use crate::call::Call;
use crate::config::{
    MiddlewareConfig, DEFAULT_CALL_METRIC, DEFAULT_REQUEST_METRIC, DEFAULT_SUBSCRIBE_METRIC,
};
use crate::outcome::{classify_with, code_extractor, CodeExtractor, HasStatusCode};
use crate::stats::{MetricsSink, StatsTable};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::warn;

/// Layer recording per-endpoint, per-outcome latency.
#[derive(Clone)]
pub struct MetricsLayer {
    sink: Arc<dyn MetricsSink>,
    metric: String,
    unit: Duration,
    extractors: Vec<CodeExtractor>,
}

impl MetricsLayer {
    /// Record under `metric` in `unit`s.
    pub fn new(sink: Arc<dyn MetricsSink>, metric: impl Into<String>, unit: Duration) -> Self {
        Self {
            sink,
            metric: metric.into(),
            unit,
            extractors: Vec::new(),
        }
    }

    /// Read status codes of `E` errors through [`HasStatusCode`] instead of
    /// scanning their text.
    #[must_use]
    pub fn with_status_code<E: HasStatusCode + 'static>(mut self) -> Self {
        self.extractors.push(code_extractor::<E>());
        self
    }

    /// Server handler metrics (`service.request`).
    #[must_use]
    pub fn handler(sink: Arc<dyn MetricsSink>, unit: Duration) -> Self {
        Self::new(sink, DEFAULT_REQUEST_METRIC, unit)
    }

    /// Outbound client call metrics (`service.call`).
    #[must_use]
    pub fn client(sink: Arc<dyn MetricsSink>, unit: Duration) -> Self {
        Self::new(sink, DEFAULT_CALL_METRIC, unit)
    }

    /// Subscriber metrics (`service.subscribe`), keyed by topic.
    #[must_use]
    pub fn subscriber(sink: Arc<dyn MetricsSink>, unit: Duration) -> Self {
        Self::new(sink, DEFAULT_SUBSCRIBE_METRIC, unit)
    }

    /// Server handler metrics using configured name and unit.
    #[must_use]
    pub fn handler_from_config(sink: Arc<dyn MetricsSink>, config: &MiddlewareConfig) -> Self {
        Self::new(sink, config.request_metric.clone(), config.unit)
    }

    /// Client call metrics using configured name and unit.
    #[must_use]
    pub fn client_from_config(sink: Arc<dyn MetricsSink>, config: &MiddlewareConfig) -> Self {
        Self::new(sink, config.call_metric.clone(), config.unit)
    }

    /// Subscriber metrics using configured name and unit.
    #[must_use]
    pub fn subscriber_from_config(sink: Arc<dyn MetricsSink>, config: &MiddlewareConfig) -> Self {
        Self::new(sink, config.subscribe_metric.clone(), config.unit)
    }
}

impl fmt::Debug for MetricsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsLayer")
            .field("metric", &self.metric)
            .field("unit", &self.unit)
            .field("extractors", &self.extractors.len())
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            stats: Arc::new(StatsTable::new(
                Arc::clone(&self.sink),
                self.metric.clone(),
                self.unit,
            )),
            extractors: Arc::from(self.extractors.as_slice()),
        }
    }
}

/// Service produced by [`MetricsLayer`].
#[derive(Clone, Debug)]
pub struct MetricsService<S> {
    inner: S,
    stats: Arc<StatsTable>,
    extractors: Arc<[CodeExtractor]>,
}

impl<S> MetricsService<S> {
    /// The stats table this service records into.
    #[must_use]
    pub fn stats(&self) -> &Arc<StatsTable> {
        &self.stats
    }
}

impl<S, R> Service<R> for MetricsService<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: 'static,
    S::Error: fmt::Display + 'static,
    R: Call,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let begin = Instant::now();
        let endpoint = req.endpoint().to_string();
        let stats = Arc::clone(&self.stats);
        let extractors = Arc::clone(&self.extractors);
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            record_call(
                &stats,
                &extractors,
                &endpoint,
                result.as_ref().err(),
                begin.elapsed(),
            );
            result
        })
    }
}

/// Classify `error` and record `elapsed` for `endpoint`, fail-open.
pub(crate) fn record_call<E>(
    stats: &StatsTable,
    extractors: &[CodeExtractor],
    endpoint: &str,
    error: Option<&E>,
    elapsed: Duration,
) where
    E: fmt::Display + 'static,
{
    match catch_unwind(AssertUnwindSafe(|| classify_with(error, extractors))) {
        Ok(outcome) => stats.record_outcome(endpoint, outcome, elapsed),
        Err(_) => {
            warn!(
                target: "rpc.middleware.metrics",
                metric = %stats.metric(),
                endpoint = %endpoint,
                "Outcome classification panicked, sample dropped"
            );
        }
    }
}
