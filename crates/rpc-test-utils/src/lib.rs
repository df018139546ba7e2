//! # RPC Middleware Test Utilities
//!
//! Mocks and fixtures for testing the interceptors without a real metrics
//! backend, log pipeline or message broker.
//!
//! ## Modules
//!
//! - `mock_sink` - Metrics sink recording every sample in memory
//! - `log_capture` - `tracing` layer capturing emitted events
//! - `mock_services` - Terminal operations and an ordering tracker layer
//! - `mock_broker` - In-memory broker delivering publishes synchronously
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rpc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let sink = RecordingSink::new();
//!     let handler = MockHandler::failing(RpcError::not_found("greeter", "no such greeter"));
//!
//!     let mut service = ServiceBuilder::new()
//!         .layer(MetricsLayer::handler(sink.shared(), Duration::from_millis(1)))
//!         .service(handler);
//!
//!     let _ = service.ready().await?.call(Request::new("greeter", "Greeter.Hello", String::new())).await;
//!
//!     assert_eq!(sink.samples("service.request.Greeter.Hello.bad").len(), 1);
//! }
//! ```

pub mod log_capture;
pub mod mock_broker;
pub mod mock_services;
pub mod mock_sink;

// Re-export commonly used items
pub use log_capture::*;
pub use mock_broker::*;
pub use mock_services::*;
pub use mock_sink::*;
