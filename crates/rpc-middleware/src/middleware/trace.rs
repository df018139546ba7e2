//! Trace id propagation.
//!
//! Guarantees every call chain carries an `X-Trace-Id`. An inherited id is
//! never overwritten, so stacking several trace layers (client wrapper on
//! the way out, handler wrapper on the way in) mints at most one id per
//! logical chain.

use crate::call::Call;
use crate::context::{CallContext, TRACE_ID_HEADER};
use common::types::TraceId;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

/// Return `context` if it already carries a trace id, otherwise a new
/// context with a freshly minted one.
#[must_use]
pub fn ensure_trace_id(context: &CallContext) -> CallContext {
    if context.trace_id().is_some() {
        return context.clone();
    }

    let trace_id = TraceId::new();
    debug!(target: "rpc.middleware.trace", trace_id = %trace_id, "Minted trace id");
    context.with_value(TRACE_ID_HEADER, trace_id.to_string())
}

/// Layer attaching a trace id to every request passing through.
///
/// Usable for client calls and server handlers alike.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceLayer;

impl TraceLayer {
    /// Create a trace layer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService { inner }
    }
}

/// Service produced by [`TraceLayer`].
#[derive(Debug, Clone)]
pub struct TraceService<S> {
    inner: S,
}

impl<S, R> Service<R> for TraceService<S>
where
    S: Service<R>,
    R: Call,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: R) -> Self::Future {
        if req.context().trace_id().is_none() {
            let context = ensure_trace_id(req.context());
            req.set_context(context);
        }
        self.inner.call(req)
    }
}
