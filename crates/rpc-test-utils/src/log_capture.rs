//! Captures `tracing` events for assertions.
//!
//! # Example
//!
//! ```rust,ignore
//! use rpc_test_utils::LogCapture;
//!
//! let capture = LogCapture::new();
//! let _guard = capture.install();
//!
//! tracing::info!(target: "rpc.middleware.log", method = "Greeter.Hello", "Serving request");
//!
//! let event = capture.find("Serving request").unwrap();
//! assert_eq!(event.field("method"), Some("Greeter.Hello"));
//! ```
//!
//! `install` sets a thread-local default subscriber, so use it with the
//! current-thread test runtime (the `#[tokio::test]` default).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// One captured event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Event target.
    pub target: String,
    /// The event's message.
    pub message: String,
    /// Every other field, formatted.
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    /// Formatted value of `name`, if the event carried it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// `tracing` layer storing every event it sees.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Create an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the current thread's default subscriber until the guard drops.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    /// All captured events, in emission order.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Captured events whose target is `target`.
    pub fn events_for(&self, target: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.target == target)
            .collect()
    }

    /// Messages of captured events, in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }

    /// First event with `message`.
    pub fn find(&self, message: &str) -> Option<CapturedEvent> {
        self.events().into_iter().find(|e| e.message == message)
    }

    /// Number of events with `message`.
    pub fn count(&self, message: &str) -> usize {
        self.events().iter().filter(|e| e.message == message).count()
    }

    /// Drop every captured event.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: HashMap<String, String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_message_target_and_fields() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        tracing::info!(target: "greeter.test", method = "Greeter.Hello", duration_ms = 5_u64, "Served request");

        let event = capture.find("Served request").unwrap();
        assert_eq!(event.level, Level::INFO);
        assert_eq!(event.target, "greeter.test");
        assert_eq!(event.field("method"), Some("Greeter.Hello"));
        assert_eq!(event.field("duration_ms"), Some("5"));
    }

    #[test]
    fn test_display_fields_are_unquoted() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let error = "boom";
        tracing::info!(error = %error, "failed");

        assert_eq!(capture.find("failed").unwrap().field("error"), Some("boom"));
    }
}
