//! Terminal operations and tracker layers.
//!
//! # Example
//!
//! ```rust,ignore
//! use rpc_test_utils::{MockHandler, OrderTracker};
//!
//! let handler = MockHandler::echo().with_delay(Duration::from_millis(150));
//! let tracker = OrderTracker::new();
//!
//! let service = ServiceBuilder::new()
//!     .layer(tracker.layer("outer"))
//!     .layer(tracker.layer("inner"))
//!     .service(handler.clone());
//!
//! // ... call the service ...
//! assert_eq!(tracker.entries(), vec!["outer:enter", "inner:enter", "inner:exit", "outer:exit"]);
//! ```

use common::rpc_error::RpcError;
use rpc_middleware::call::{Call, Publication, Request};
use rpc_middleware::context::CallContext;
use rpc_middleware::middleware::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

#[derive(Debug, Clone)]
enum Behavior {
    Echo,
    Fail(RpcError),
}

/// Terminal operation that echoes its payload or fails with a fixed error.
///
/// Records the context of every call it receives. Clones share that record.
#[derive(Debug, Clone)]
pub struct MockHandler {
    behavior: Behavior,
    delay: Option<Duration>,
    seen: Arc<Mutex<Vec<CallContext>>>,
    calls: Arc<AtomicUsize>,
}

impl MockHandler {
    /// Return the request body (or publication message) unchanged.
    #[must_use]
    pub fn echo() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    /// Fail every call with `error`.
    #[must_use]
    pub fn failing(error: RpcError) -> Self {
        Self::with_behavior(Behavior::Fail(error))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            seen: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Contexts of every call received, in arrival order.
    pub fn seen_contexts(&self) -> Vec<CallContext> {
        self.seen.lock().unwrap().clone()
    }

    /// Trace ids of every call received.
    pub fn seen_trace_ids(&self) -> Vec<Option<String>> {
        self.seen_contexts()
            .iter()
            .map(|ctx| ctx.trace_id().map(str::to_string))
            .collect()
    }

    /// Number of calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond<T: Send + 'static>(&self, context: &CallContext, payload: T) -> BoxFuture<Result<T, RpcError>> {
        self.seen.lock().unwrap().push(context.clone());
        self.calls.fetch_add(1, Ordering::SeqCst);

        let behavior = self.behavior.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match behavior {
                Behavior::Echo => Ok(payload),
                Behavior::Fail(error) => Err(error),
            }
        })
    }
}

impl<B: Send + 'static> Service<Request<B>> for MockHandler {
    type Response = B;
    type Error = RpcError;
    type Future = BoxFuture<Result<B, RpcError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let context = req.context().clone();
        self.respond(&context, req.into_body())
    }
}

impl<M: Send + 'static> Service<Publication<M>> for MockHandler {
    type Response = M;
    type Error = RpcError;
    type Future = BoxFuture<Result<M, RpcError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, publication: Publication<M>) -> Self::Future {
        let context = publication.context().clone();
        self.respond(&context, publication.into_message())
    }
}

/// Shared log of layer entry/exit, for checking composition order.
#[derive(Debug, Clone, Default)]
pub struct OrderTracker {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OrderTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer logging `<name>:enter` and `<name>:exit` into this tracker.
    #[must_use]
    pub fn layer(&self, name: &str) -> OrderLayer {
        OrderLayer {
            name: name.to_string(),
            entries: Arc::clone(&self.entries),
        }
    }

    /// Logged entries, in order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// Layer produced by [`OrderTracker::layer`].
#[derive(Debug, Clone)]
pub struct OrderLayer {
    name: String,
    entries: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for OrderLayer {
    type Service = OrderService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OrderService {
            inner,
            name: self.name.clone(),
            entries: Arc::clone(&self.entries),
        }
    }
}

/// Service produced by [`OrderLayer`].
#[derive(Debug, Clone)]
pub struct OrderService<S> {
    inner: S,
    name: String,
    entries: Arc<Mutex<Vec<String>>>,
}

impl<S, R> Service<R> for OrderService<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: 'static,
    S::Error: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        self.entries
            .lock()
            .unwrap()
            .push(format!("{}:enter", self.name));
        let exit = format!("{}:exit", self.name);
        let entries = Arc::clone(&self.entries);
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            entries.lock().unwrap().push(exit);
            result
        })
    }
}
