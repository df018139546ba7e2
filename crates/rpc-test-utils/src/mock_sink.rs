//! In-memory metrics sink.
//!
//! Records every histogram registration and sample so tests can assert on
//! exact names and counts.
//!
//! # Example
//!
//! ```rust,ignore
//! use rpc_test_utils::RecordingSink;
//!
//! let sink = RecordingSink::new();
//! let stats = StatsTable::new(sink.shared(), "service.request", Duration::from_millis(1));
//! stats.record_outcome("Greeter.Hello", Outcome::Success, Duration::from_millis(5));
//!
//! assert_eq!(sink.samples("service.request.Greeter.Hello.success"), vec![5]);
//! assert_eq!(sink.registrations("service.request.Greeter.Hello.success"), 1);
//! ```

use common::error::InstrumentError;
use rpc_middleware::stats::{Histogram, MetricsSink};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Histogram keeping every recorded sample.
#[derive(Debug)]
pub struct RecordingHistogram {
    samples: Mutex<Vec<u64>>,
    panic_on_record: Arc<AtomicBool>,
}

impl Histogram for RecordingHistogram {
    fn record(&self, value: u64) {
        if self.panic_on_record.load(Ordering::SeqCst) {
            panic!("RecordingHistogram configured to panic");
        }
        self.samples.lock().unwrap().push(value);
    }
}

/// Metrics sink recording registrations and samples in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<RecordingSinkInner>>,
    fail_registrations: Arc<AtomicBool>,
    panic_on_record: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct RecordingSinkInner {
    /// Histograms by full name
    histograms: HashMap<String, Arc<RecordingHistogram>>,
    /// Number of `histogram()` calls per name
    registrations: HashMap<String, usize>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This sink as a shareable trait object.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn MetricsSink> {
        Arc::new(self.clone())
    }

    /// Make every subsequent registration fail (or succeed again).
    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registrations.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent sample panic (or record again).
    pub fn panic_on_record(&self, panic: bool) {
        self.panic_on_record.store(panic, Ordering::SeqCst);
    }

    /// Samples recorded under `name`, in recording order.
    pub fn samples(&self, name: &str) -> Vec<u64> {
        let inner = self.inner.lock().unwrap();
        inner
            .histograms
            .get(name)
            .map(|h| h.samples.lock().unwrap().clone())
            .unwrap_or_default()
    }

    /// Number of times `name` was requested from the sink.
    pub fn registrations(&self, name: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.registrations.get(name).copied().unwrap_or(0)
    }

    /// Every registered histogram name, sorted.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut names: Vec<String> = inner.histograms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total samples across all histograms.
    pub fn total_samples(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .histograms
            .values()
            .map(|h| h.samples.lock().unwrap().len())
            .sum()
    }
}

impl MetricsSink for RecordingSink {
    fn histogram(&self, name: &str) -> Result<Arc<dyn Histogram>, InstrumentError> {
        if self.fail_registrations.load(Ordering::SeqCst) {
            return Err(InstrumentError::Sink(format!(
                "registration refused for {name}"
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        *inner.registrations.entry(name.to_string()).or_insert(0) += 1;
        let histogram = inner
            .histograms
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(RecordingHistogram {
                    samples: Mutex::new(Vec::new()),
                    panic_on_record: Arc::clone(&self.panic_on_record),
                })
            })
            .clone();
        Ok(histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_and_samples() {
        let sink = RecordingSink::new();
        let histogram = sink.histogram("a.b.success").unwrap();
        histogram.record(3);
        histogram.record(4);

        assert_eq!(sink.samples("a.b.success"), vec![3, 4]);
        assert_eq!(sink.registrations("a.b.success"), 1);
        assert_eq!(sink.total_samples(), 2);
        assert!(sink.samples("missing").is_empty());
    }

    #[test]
    fn test_fail_registrations() {
        let sink = RecordingSink::new();
        sink.fail_registrations(true);
        assert!(sink.histogram("x").is_err());
        assert_eq!(sink.registrations("x"), 0);

        sink.fail_registrations(false);
        assert!(sink.histogram("x").is_ok());
    }
}
