//! Tests for the `metrics` facade sink.
//!
//! Uses a local `DebuggingRecorder` so no global recorder is installed.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use rpc_middleware::observability::FacadeSink;
use rpc_middleware::outcome::Outcome;
use rpc_middleware::stats::StatsTable;

fn histogram_len(
    snapshot: &[(
        metrics_util::CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue,
    )],
    name: &str,
) -> Option<usize> {
    snapshot
        .iter()
        .find(|(key, _, _, _)| key.key().name() == name)
        .and_then(|(_, _, _, value)| match value {
            DebugValue::Histogram(values) => Some(values.len()),
            _ => None,
        })
}

#[test]
fn test_facade_sink_records_into_installed_recorder() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let stats = StatsTable::new(
            Arc::new(FacadeSink::new()),
            "service.request",
            Duration::from_millis(1),
        );
        stats.record_outcome("Greeter.Hello", Outcome::Success, Duration::from_millis(12));
        stats.record_outcome("Greeter.Hello", Outcome::Success, Duration::from_millis(8));
        stats.record_outcome("Greeter.Hello", Outcome::Dropped, Duration::from_millis(30));
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        histogram_len(&snapshot, "service.request.Greeter.Hello.success"),
        Some(2)
    );
    assert_eq!(
        histogram_len(&snapshot, "service.request.Greeter.Hello.dropped"),
        Some(1)
    );
}
