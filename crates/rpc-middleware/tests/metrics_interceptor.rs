//! Tests for the metrics interceptor.
//!
//! Verifies:
//! - Results pass through unchanged
//! - Latency lands in the bucket the result classifies into
//! - Client, handler and subscriber metrics use their own names
//! - Each layer instance owns its own stats table

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::time::Duration;

use common::error::BoxError;
use common::rpc_error::RpcError;
use rpc_middleware::call::{Publication, Request};
use rpc_middleware::config::MiddlewareConfig;
use rpc_middleware::middleware::MetricsLayer;
use rpc_middleware::outcome::HasStatusCode;
use rpc_test_utils::{MockHandler, RecordingSink};
use tower::{service_fn, Layer, Service, ServiceBuilder, ServiceExt};

const MS: Duration = Duration::from_millis(1);

fn hello(body: &str) -> Request<String> {
    Request::new("greeter", "Greeter.Hello", body.to_string())
}

#[tokio::test]
async fn test_success_passes_through_and_records_success() {
    let sink = RecordingSink::new();
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::handler(sink.shared(), MS))
        .service(MockHandler::echo());

    let response = ServiceExt::<Request<String>>::ready(&mut service).await.unwrap().call(hello("world")).await;

    assert_eq!(response.unwrap(), "world");
    assert_eq!(sink.samples("service.request.Greeter.Hello.success").len(), 1);
    assert_eq!(sink.total_samples(), 1);
}

#[tokio::test]
async fn test_not_found_records_bad_and_returns_identical_error() {
    let sink = RecordingSink::new();
    let expected = RpcError::not_found("greeter", "greeter not found");
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::handler(sink.shared(), MS))
        .service(MockHandler::failing(expected.clone()));

    let err = ServiceExt::<Request<String>>::ready(&mut service)
        .await
        .unwrap()
        .call(hello("world"))
        .await
        .unwrap_err();

    assert_eq!(err, expected);
    assert_eq!(sink.samples("service.request.Greeter.Hello.bad").len(), 1);
    assert!(sink.samples("service.request.Greeter.Hello.success").is_empty());
    assert!(sink.samples("service.request.Greeter.Hello.errors").is_empty());
    assert!(sink.samples("service.request.Greeter.Hello.dropped").is_empty());
}

#[tokio::test]
async fn test_timeout_records_dropped() {
    let sink = RecordingSink::new();
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::client(sink.shared(), MS))
        .service(MockHandler::failing(RpcError::timeout("greeter", "deadline passed")));

    let _ = ServiceExt::<Request<String>>::ready(&mut service).await.unwrap().call(hello("x")).await;

    assert_eq!(sink.samples("service.call.Greeter.Hello.dropped").len(), 1);
}

#[tokio::test]
async fn test_text_error_code_is_recovered() {
    let sink = RecordingSink::new();
    let terminal = service_fn(|_req: Request<String>| async {
        Err::<String, BoxError>(r#"upstream said {"id":"x","code":403,"detail":"no"}"#.into())
    });
    let mut service = MetricsLayer::handler(sink.shared(), MS).layer(terminal);

    let _ = service.ready().await.unwrap().call(hello("x")).await;

    assert_eq!(sink.samples("service.request.Greeter.Hello.bad").len(), 1);
}

#[tokio::test]
async fn test_uncoded_error_records_internal_error() {
    let sink = RecordingSink::new();
    let terminal = service_fn(|_req: Request<String>| async {
        Err::<String, BoxError>("connection reset by peer".into())
    });
    let mut service = MetricsLayer::handler(sink.shared(), MS).layer(terminal);

    let err = service.ready().await.unwrap().call(hello("x")).await.unwrap_err();

    assert_eq!(err.to_string(), "connection reset by peer");
    assert_eq!(sink.samples("service.request.Greeter.Hello.errors").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_latency_recorded_in_milliseconds() {
    let sink = RecordingSink::new();
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::handler(sink.shared(), MS))
        .service(MockHandler::echo().with_delay(Duration::from_millis(150)));

    ServiceExt::<Request<String>>::ready(&mut service).await.unwrap().call(hello("x")).await.unwrap();

    let samples = sink.samples("service.request.Greeter.Hello.success");
    assert_eq!(samples.len(), 1);
    assert!(
        (150..152).contains(&samples[0]),
        "expected 150ms, got {}",
        samples[0]
    );
}

#[tokio::test]
async fn test_subscriber_metrics_keyed_by_topic() {
    let sink = RecordingSink::new();
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::subscriber(sink.shared(), MS))
        .service(MockHandler::echo());

    ServiceExt::<Publication<u32>>::ready(&mut service)
        .await
        .unwrap()
        .call(Publication::new("orders.created", 7_u32))
        .await
        .unwrap();

    assert_eq!(sink.samples("service.subscribe.orders.created.success").len(), 1);
}

#[tokio::test]
async fn test_configured_names_and_unit() {
    let sink = RecordingSink::new();
    let config = MiddlewareConfig {
        unit: Duration::from_micros(1),
        request_metric: "greeter.request".to_string(),
        ..MiddlewareConfig::default()
    };
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::handler_from_config(sink.shared(), &config))
        .service(MockHandler::echo().with_delay(Duration::from_millis(2)));

    ServiceExt::<Request<String>>::ready(&mut service).await.unwrap().call(hello("x")).await.unwrap();

    let samples = sink.samples("greeter.request.Greeter.Hello.success");
    assert_eq!(samples.len(), 1);
    assert!(samples[0] >= 2000, "expected microseconds, got {}", samples[0]);
}

#[tokio::test]
async fn test_each_layer_owns_its_table_and_clones_share_it() {
    let sink = RecordingSink::new();
    let layer = MetricsLayer::handler(sink.shared(), MS);

    let first = layer.layer(MockHandler::echo());
    let second = layer.layer(MockHandler::echo());
    let first_clone = first.clone();

    first.clone().oneshot(hello("a")).await.unwrap();

    assert!(first.stats().contains("Greeter.Hello"));
    assert!(first_clone.stats().contains("Greeter.Hello"));
    assert!(second.stats().is_empty());
}

#[tokio::test]
async fn test_sink_failure_never_reaches_caller() {
    let sink = RecordingSink::new();
    sink.fail_registrations(true);
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::handler(sink.shared(), MS))
        .service(MockHandler::echo());

    let response = ServiceExt::<Request<String>>::ready(&mut service).await.unwrap().call(hello("still here")).await;

    assert_eq!(response.unwrap(), "still here");
    assert_eq!(sink.total_samples(), 0);
}

#[tokio::test]
async fn test_panicking_sink_never_reaches_caller() {
    let sink = RecordingSink::new();
    sink.panic_on_record(true);
    let expected = RpcError::bad_request("greeter", "missing name");
    let mut service = ServiceBuilder::new()
        .layer(MetricsLayer::handler(sink.shared(), MS))
        .service(MockHandler::failing(expected.clone()));

    let err = ServiceExt::<Request<String>>::ready(&mut service).await.unwrap().call(hello("x")).await.unwrap_err();

    assert_eq!(err, expected);
}

#[tokio::test]
async fn test_grpc_status_errors_are_classified() {
    let sink = RecordingSink::new();
    let terminal = service_fn(|req: Request<String>| async move {
        match req.body().as_str() {
            "slow" => Err::<String, tonic::Status>(tonic::Status::deadline_exceeded("too slow")),
            _ => Err(tonic::Status::unavailable("backend down")),
        }
    });
    let layer = MetricsLayer::client(sink.shared(), MS);
    let service = layer.layer(terminal);

    let _ = service.clone().oneshot(hello("slow")).await;
    let _ = service.oneshot(hello("other")).await;

    assert_eq!(sink.samples("service.call.Greeter.Hello.dropped").len(), 1);
    assert_eq!(sink.samples("service.call.Greeter.Hello.errors").len(), 1);
}

#[tokio::test]
async fn test_foreign_error_type_is_recorded() {
    let sink = RecordingSink::new();
    let terminal = service_fn(|req: Request<String>| async move {
        match req.body().as_str() {
            "relayed" => Err::<String, std::io::Error>(std::io::Error::other(
                r#"upstream: {"id":"greeter","code":404}"#,
            )),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
        }
    });
    let service = MetricsLayer::client(sink.shared(), MS).layer(terminal);

    let err = service.clone().oneshot(hello("relayed")).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::Other);
    let err = service.oneshot(hello("reset")).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);

    assert_eq!(sink.samples("service.call.Greeter.Hello.bad").len(), 1);
    assert_eq!(sink.samples("service.call.Greeter.Hello.errors").len(), 1);
}

#[derive(Debug, Clone, PartialEq)]
struct QuotaError {
    retry_after_secs: u64,
}

impl std::fmt::Display for QuotaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "quota exhausted, retry in {}s", self.retry_after_secs)
    }
}

impl HasStatusCode for QuotaError {
    fn status_code(&self) -> Option<i32> {
        Some(429)
    }
}

#[tokio::test]
async fn test_registered_error_type_uses_its_own_code() {
    let sink = RecordingSink::new();
    let terminal = service_fn(|_: Request<String>| async {
        Err::<String, QuotaError>(QuotaError {
            retry_after_secs: 30,
        })
    });

    let plain = MetricsLayer::handler(sink.shared(), MS).layer(terminal.clone());
    let _ = plain.oneshot(hello("x")).await;
    assert_eq!(sink.samples("service.request.Greeter.Hello.errors").len(), 1);

    let registered = MetricsLayer::client(sink.shared(), MS)
        .with_status_code::<QuotaError>()
        .layer(terminal);
    let err = registered.oneshot(hello("x")).await.unwrap_err();

    assert_eq!(err.retry_after_secs, 30);
    assert_eq!(sink.samples("service.call.Greeter.Hello.bad").len(), 1);
}
