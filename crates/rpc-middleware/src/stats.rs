//! Endpoint stats table.
//!
//! One [`StatsTable`] belongs to one metrics interceptor instance. It maps an
//! endpoint name (method or topic) to an [`EndpointRecord`] holding one
//! latency histogram per [`Outcome`] bucket:
//!
//! ```text
//! <metric>.<endpoint>.success
//! <metric>.<endpoint>.bad
//! <metric>.<endpoint>.dropped
//! <metric>.<endpoint>.errors
//! ```
//!
//! Records are created lazily on first use and never removed. Creation is
//! at-most-once per endpoint name, even when concurrent callers race on the
//! same fresh name: the vacant entry is filled while its shard is
//! write-locked, so the loser of the race observes the winner's record.
//!
//! Recording is fail-open. A sink that refuses a histogram, or panics, costs
//! one lost sample and a log line; it never reaches the wrapped call.

use crate::outcome::Outcome;
use common::error::InstrumentError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Write-only latency histogram provided by a metrics backend.
///
/// Implementations must be safe to record into from many threads; the
/// stats table does not serialize writes.
pub trait Histogram: Send + Sync {
    /// Record one sample, already converted into the configured unit.
    fn record(&self, value: u64);
}

/// Metrics backend handing out named histograms.
pub trait MetricsSink: Send + Sync {
    /// Get or register the histogram called `name`.
    ///
    /// # Errors
    ///
    /// Returns `InstrumentError::Sink` if the backend cannot provide it.
    fn histogram(&self, name: &str) -> Result<Arc<dyn Histogram>, InstrumentError>;
}

/// Per-endpoint histograms, one per outcome bucket.
pub struct EndpointRecord {
    success: Arc<dyn Histogram>,
    bad: Arc<dyn Histogram>,
    dropped: Arc<dyn Histogram>,
    errors: Arc<dyn Histogram>,
}

impl EndpointRecord {
    /// Register the four bucket histograms under `base`.
    ///
    /// # Errors
    ///
    /// Propagates the first sink failure; no partial record is produced.
    pub fn create(sink: &dyn MetricsSink, base: &str) -> Result<Self, InstrumentError> {
        let named = |outcome: Outcome| {
            sink.histogram(&format!("{base}.{}", outcome.histogram_suffix()))
        };
        Ok(Self {
            success: named(Outcome::Success)?,
            bad: named(Outcome::BadRequest)?,
            dropped: named(Outcome::Dropped)?,
            errors: named(Outcome::InternalError)?,
        })
    }

    /// Histogram for `outcome`.
    #[must_use]
    pub fn histogram(&self, outcome: Outcome) -> &Arc<dyn Histogram> {
        match outcome {
            Outcome::Success => &self.success,
            Outcome::BadRequest => &self.bad,
            Outcome::Dropped => &self.dropped,
            Outcome::InternalError => &self.errors,
        }
    }
}

impl fmt::Debug for EndpointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRecord").finish_non_exhaustive()
    }
}

/// Lazily populated endpoint → record table.
pub struct StatsTable {
    sink: Arc<dyn MetricsSink>,
    metric: String,
    unit: Duration,
    endpoints: DashMap<String, Arc<EndpointRecord>>,
}

impl StatsTable {
    /// Create an empty table recording under `metric` in `unit`s.
    pub fn new(sink: Arc<dyn MetricsSink>, metric: impl Into<String>, unit: Duration) -> Self {
        Self {
            sink,
            metric: metric.into(),
            unit,
            endpoints: DashMap::new(),
        }
    }

    /// Base metric name, e.g. `service.request`.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Recording unit.
    #[must_use]
    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Number of endpoint records created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether no endpoint has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Whether a record exists for `endpoint`.
    #[must_use]
    pub fn contains(&self, endpoint: &str) -> bool {
        self.endpoints.contains_key(endpoint)
    }

    /// Convert `elapsed` into whole units (integer division, truncating).
    ///
    /// Returns `None` for a zero unit.
    #[must_use]
    pub fn duration_to_unit(&self, elapsed: Duration) -> Option<u64> {
        elapsed
            .as_nanos()
            .checked_div(self.unit.as_nanos())
            .map(|units| u64::try_from(units).unwrap_or(u64::MAX))
    }

    /// Record `elapsed` into `endpoint`'s histogram for `outcome`.
    ///
    /// Never fails and never panics; instrumentation problems are logged
    /// and the sample is dropped.
    pub fn record_outcome(&self, endpoint: &str, outcome: Outcome, elapsed: Duration) {
        let Some(value) = self.duration_to_unit(elapsed) else {
            debug!(
                target: "rpc.middleware.metrics",
                metric = %self.metric,
                "Zero recording unit, sample dropped"
            );
            return;
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.endpoint(endpoint)
                .map(|record| record.histogram(outcome).record(value))
        }));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(
                    target: "rpc.middleware.metrics",
                    metric = %self.metric,
                    endpoint = %endpoint,
                    error = %e,
                    "Failed to record outcome"
                );
            }
            Err(_) => {
                warn!(
                    target: "rpc.middleware.metrics",
                    metric = %self.metric,
                    endpoint = %endpoint,
                    "Metrics sink panicked while recording, sample dropped"
                );
            }
        }
    }

    /// Look up or create the record for `name`.
    fn endpoint(&self, name: &str) -> Result<Arc<EndpointRecord>, InstrumentError> {
        if let Some(record) = self.endpoints.get(name) {
            return Ok(Arc::clone(record.value()));
        }

        match self.endpoints.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let base = format!("{}.{name}", self.metric);
                let record = Arc::new(EndpointRecord::create(self.sink.as_ref(), &base)?);
                entry.insert(Arc::clone(&record));
                Ok(record)
            }
        }
    }
}

impl fmt::Debug for StatsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsTable")
            .field("metric", &self.metric)
            .field("unit", &self.unit)
            .field("endpoints", &self.endpoints.len())
            .finish_non_exhaustive()
    }
}
