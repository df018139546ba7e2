//! Trace id interceptor for tonic clients and servers.

use common::types::TraceId;
use tonic::{service::Interceptor, Request, Status};
use tracing::instrument;

/// gRPC metadata key carrying the trace id. gRPC metadata keys are
/// lowercase; [`super::metadata::context_from_metadata`] maps it back to
/// `X-Trace-Id`.
pub const TRACE_ID_METADATA_KEY: &str = "x-trace-id";

/// Ensures every request carries `x-trace-id`.
///
/// An existing id is kept as is. The interceptor never rejects a request;
/// if a value cannot be attached the request continues without one.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceInterceptor;

impl TraceInterceptor {
    /// Create a new trace interceptor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Interceptor for TraceInterceptor {
    #[instrument(skip_all, name = "rpc.grpc.trace_interceptor")]
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if request.metadata().contains_key(TRACE_ID_METADATA_KEY) {
            return Ok(request);
        }

        let trace_id = TraceId::new().to_string();
        match trace_id.parse() {
            Ok(value) => {
                request.metadata_mut().insert(TRACE_ID_METADATA_KEY, value);
                tracing::debug!(
                    target: "rpc.middleware.trace",
                    trace_id = %trace_id,
                    "Attached new trace id"
                );
            }
            Err(e) => {
                tracing::debug!(
                    target: "rpc.middleware.trace",
                    error = %e,
                    "Trace id is not valid metadata, continuing without"
                );
            }
        }

        Ok(request)
    }
}
