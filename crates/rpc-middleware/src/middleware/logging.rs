//! Structured request logging.
//!
//! Emits one event before the wrapped operation runs (ambient metadata,
//! method or topic, target service for client calls) and one after it
//! completes (duration in whole milliseconds, rounded to nearest, and the
//! error if any). The operation's result passes through unchanged.

use super::BoxFuture;
use crate::call::Call;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::info;

const TARGET: &str = "rpc.middleware.log";

/// Logged in place of an error whose `Display` impl panicked.
pub const UNPRINTABLE_ERROR: &str = "<error display panicked>";

/// Which interception point a log layer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Outbound client call.
    Client,
    /// Inbound server handler.
    Handler,
    /// Message subscriber.
    Subscriber,
}

/// Round a duration to the nearest whole millisecond.
#[must_use]
pub fn round_millis(elapsed: Duration) -> u64 {
    u64::try_from((elapsed.as_nanos() + 500_000) / 1_000_000).unwrap_or(u64::MAX)
}

/// Render `error` for a log field, falling back to [`UNPRINTABLE_ERROR`].
pub(crate) fn describe_error<E: fmt::Display + ?Sized>(error: &E) -> String {
    catch_unwind(AssertUnwindSafe(|| error.to_string()))
        .unwrap_or_else(|_| UNPRINTABLE_ERROR.to_string())
}

/// Layer emitting pre/post call log events.
#[derive(Debug, Clone, Copy)]
pub struct LogLayer {
    side: Side,
}

impl LogLayer {
    /// Log outbound client calls.
    #[must_use]
    pub const fn client() -> Self {
        Self { side: Side::Client }
    }

    /// Log inbound server requests.
    #[must_use]
    pub const fn handler() -> Self {
        Self {
            side: Side::Handler,
        }
    }

    /// Log delivered messages.
    #[must_use]
    pub const fn subscriber() -> Self {
        Self {
            side: Side::Subscriber,
        }
    }

    /// The interception point this layer logs for.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }
}

impl<S> Layer<S> for LogLayer {
    type Service = LogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LogService {
            inner,
            side: self.side,
        }
    }
}

/// Service produced by [`LogLayer`].
#[derive(Debug, Clone)]
pub struct LogService<S> {
    inner: S,
    side: Side,
}

impl<S, R> Service<R> for LogService<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: 'static,
    S::Error: fmt::Display + 'static,
    R: Call,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let side = self.side;
        let endpoint = req.endpoint().to_string();
        log_start(side, &req);

        let begin = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            log_finish(side, &endpoint, begin.elapsed(), result.as_ref().err());
            result
        })
    }
}

pub(crate) fn log_start<R: Call>(side: Side, req: &R) {
    let ctx = req.context().metadata().cloned().unwrap_or_default();
    match side {
        Side::Client => info!(
            target: TARGET,
            ctx = ?ctx,
            service = req.service().unwrap_or_default(),
            method = req.endpoint(),
            "Calling service"
        ),
        Side::Handler => info!(
            target: TARGET,
            ctx = ?ctx,
            method = req.endpoint(),
            "Serving request"
        ),
        Side::Subscriber => info!(
            target: TARGET,
            ctx = ?ctx,
            topic = req.endpoint(),
            content_type = req.content_type().unwrap_or_default(),
            "Received message"
        ),
    }
}

pub(crate) fn log_finish<E: fmt::Display + ?Sized>(
    side: Side,
    endpoint: &str,
    elapsed: Duration,
    error: Option<&E>,
) {
    let duration_ms = round_millis(elapsed);
    let error = error.map(describe_error);
    match (side, error) {
        (Side::Client, None) => info!(
            target: TARGET,
            method = endpoint,
            duration_ms,
            "Called service"
        ),
        (Side::Client, Some(e)) => info!(
            target: TARGET,
            method = endpoint,
            duration_ms,
            error = %e,
            "Called service"
        ),
        (Side::Handler, None) => info!(
            target: TARGET,
            method = endpoint,
            duration_ms,
            "Served request"
        ),
        (Side::Handler, Some(e)) => info!(
            target: TARGET,
            method = endpoint,
            duration_ms,
            error = %e,
            "Served request"
        ),
        (Side::Subscriber, None) => info!(
            target: TARGET,
            topic = endpoint,
            duration_ms,
            "Handled message"
        ),
        (Side::Subscriber, Some(e)) => info!(
            target: TARGET,
            topic = endpoint,
            duration_ms,
            error = %e,
            "Handled message"
        ),
    }
}
