//! Tests for trace id propagation.
//!
//! Verifies:
//! - A call without a trace id gets exactly one
//! - Client and handler trace layers stacked on one path mint one id
//! - Nested calls inherit the caller's id
//! - Independent chains get distinct ids

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use rpc_middleware::call::{Call, Request};
use rpc_middleware::context::{CallContext, TRACE_ID_HEADER};
use rpc_middleware::middleware::TraceLayer;
use rpc_test_utils::MockHandler;
use tower::{service_fn, ServiceBuilder, ServiceExt};

fn hello() -> Request<String> {
    Request::new("greeter", "Greeter.Hello", String::new())
}

#[tokio::test]
async fn test_missing_trace_id_is_attached() {
    let handler = MockHandler::echo();
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new())
        .service(handler.clone());

    service.oneshot(hello()).await.unwrap();

    let ids = handler.seen_trace_ids();
    assert_eq!(ids.len(), 1);
    assert!(uuid::Uuid::parse_str(ids[0].as_deref().unwrap()).is_ok());
}

#[tokio::test]
async fn test_inherited_trace_id_is_kept() {
    let handler = MockHandler::echo();
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new())
        .service(handler.clone());
    let request = hello().with_context(CallContext::new().with_value(TRACE_ID_HEADER, "upstream"));

    service.oneshot(request).await.unwrap();

    assert_eq!(handler.seen_trace_ids(), vec![Some("upstream".to_string())]);
}

#[tokio::test]
async fn test_client_and_handler_layers_share_one_id() {
    let handler = MockHandler::echo();
    // client trace layer on the way out, handler trace layer on the way in
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new())
        .layer(TraceLayer::new())
        .service(handler.clone());

    service.oneshot(hello()).await.unwrap();

    let contexts = handler.seen_contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].trace_id().is_some());
    assert_eq!(contexts[0].metadata().map(|md| md.len()), Some(1));
}

#[tokio::test]
async fn test_nested_call_inherits_caller_trace_id() {
    let downstream = MockHandler::echo();
    let client = ServiceBuilder::new()
        .layer(TraceLayer::new())
        .service(downstream.clone());

    let upstream = service_fn(move |req: Request<String>| {
        let client = client.clone();
        async move {
            let nested = Request::new("store", "Store.Get", req.body().clone())
                .with_context(req.context().clone());
            let body = client.oneshot(nested).await?;
            Ok::<_, common::rpc_error::RpcError>(body)
        }
    });
    let server = ServiceBuilder::new().layer(TraceLayer::new()).service(upstream);

    let request = hello().with_context(CallContext::new().with_value("User", "alice"));
    server.oneshot(request).await.unwrap();

    let contexts = downstream.seen_contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].trace_id().is_some());
    assert_eq!(contexts[0].get("User"), Some("alice"));
}

#[tokio::test]
async fn test_independent_chains_get_distinct_ids() {
    let handler = MockHandler::echo();
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new())
        .service(handler.clone());

    service.clone().oneshot(hello()).await.unwrap();
    service.oneshot(hello()).await.unwrap();

    let ids = handler.seen_trace_ids();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_caller_context_is_not_mutated() {
    let handler = MockHandler::echo();
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new())
        .service(handler.clone());
    let context = CallContext::new().with_value("User", "alice");

    service
        .oneshot(hello().with_context(context.clone()))
        .await
        .unwrap();

    assert!(context.trace_id().is_none());
    assert!(handler.seen_contexts()[0].trace_id().is_some());
}
