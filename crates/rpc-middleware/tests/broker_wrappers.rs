//! Tests for the broker metrics and log wrappers.
//!
//! Verifies:
//! - Publishes and deliveries are recorded per topic
//! - Handler errors are classified and still reach the broker
//! - Non-instrumented methods are forwarded
//! - Publish and delivery log events

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::time::Duration;

use common::error::BoxError;
use common::rpc_error::RpcError;
use rpc_middleware::broker::{handler_fn, Broker, LogBroker, Message, MetricsBroker};
use rpc_middleware::call::{Call, Publication};
use rpc_middleware::context::TRACE_ID_HEADER;
use rpc_test_utils::{InMemoryBroker, LogCapture, RecordingSink, IN_MEMORY_ADDRESS};

const MS: Duration = Duration::from_millis(1);
const TOPIC: &str = "orders.created";

fn rejecting_empty_bodies() -> rpc_middleware::broker::BrokerHandler {
    handler_fn(|publication: Publication<Message>| async move {
        if publication.message().body.is_empty() {
            Err::<(), BoxError>(Box::new(RpcError::bad_request("orders", "empty order")))
        } else {
            Ok(())
        }
    })
}

#[tokio::test]
async fn test_publish_and_delivery_recorded_by_topic() {
    let sink = RecordingSink::new();
    let memory = InMemoryBroker::new();
    let broker = MetricsBroker::new(memory.clone(), sink.shared(), MS);

    broker.subscribe(TOPIC, rejecting_empty_bodies()).await.unwrap();
    broker.publish(TOPIC, Message::new(b"{}".to_vec())).await.unwrap();
    broker.publish(TOPIC, Message::new(Vec::new())).await.unwrap();

    assert_eq!(sink.samples("service.publish.orders.created.success").len(), 2);
    assert_eq!(sink.samples("service.subscribe.orders.created.success").len(), 1);
    assert_eq!(sink.samples("service.subscribe.orders.created.bad").len(), 1);
    assert_eq!(memory.handler_errors(), 1);
    assert!(broker.publish_stats().contains(TOPIC));
    assert!(broker.subscribe_stats().contains(TOPIC));
}

#[tokio::test]
async fn test_publish_error_is_classified_and_returned() {
    let sink = RecordingSink::new();
    let memory = InMemoryBroker::new().with_publish_error(RpcError::timeout("broker", "no ack"));
    let broker = MetricsBroker::new(memory, sink.shared(), MS);

    let err = broker
        .publish(TOPIC, Message::new(b"{}".to_vec()))
        .await
        .unwrap_err();

    let rpc = err.downcast_ref::<RpcError>().unwrap();
    assert_eq!(rpc.code, 408);
    assert_eq!(sink.samples("service.publish.orders.created.dropped").len(), 1);
}

#[tokio::test]
async fn test_wrappers_forward_capability() {
    let memory = InMemoryBroker::new();
    let broker = LogBroker::new(MetricsBroker::new(
        memory.clone(),
        RecordingSink::new().shared(),
        MS,
    ));

    assert_eq!(broker.address(), IN_MEMORY_ADDRESS);
    broker.connect().await.unwrap();
    assert!(memory.is_connected());

    let subscription = broker.subscribe(TOPIC, rejecting_empty_bodies()).await.unwrap();
    assert_eq!(subscription.topic(), TOPIC);
    assert_eq!(memory.subscriber_count(TOPIC), 1);

    subscription.unsubscribe().await.unwrap();
    assert_eq!(memory.subscriber_count(TOPIC), 0);

    broker.disconnect().await.unwrap();
    assert!(!memory.is_connected());
}

#[tokio::test]
async fn test_delivery_carries_headers_as_context() {
    let memory = InMemoryBroker::new();
    let broker = MetricsBroker::new(memory.clone(), RecordingSink::new().shared(), MS);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    broker
        .subscribe(
            TOPIC,
            handler_fn(move |publication: Publication<Message>| {
                let tx = tx.clone();
                async move {
                    tx.send(publication.context().trace_id().map(str::to_string))
                        .unwrap();
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();
    broker
        .publish(
            TOPIC,
            Message::new(b"{}".to_vec()).with_header(TRACE_ID_HEADER, "abc"),
        )
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap().as_deref(), Some("abc"));
    assert_eq!(memory.published().len(), 1);
}

#[tokio::test]
async fn test_log_broker_events() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let broker = LogBroker::new(InMemoryBroker::new());

    broker.subscribe(TOPIC, rejecting_empty_bodies()).await.unwrap();
    broker.publish(TOPIC, Message::new(Vec::new())).await.unwrap();

    assert_eq!(
        capture.messages(),
        vec![
            "Publishing message",
            "Received message",
            "Handled message",
            "Published message",
        ]
    );
    let handled = capture.find("Handled message").unwrap();
    assert_eq!(handled.field("topic"), Some(TOPIC));
    assert!(handled.field("error").unwrap().contains("empty order"));
    assert!(capture.find("Published message").unwrap().field("error").is_none());
}
