//! gRPC bridge.
//!
//! Connects the interceptors to tonic:
//!
//! - [`status`] - `tonic::Status` codes mapped to HTTP-style status codes
//!   so gRPC failures land in the right outcome bucket
//! - [`trace_interceptor`] - a tonic interceptor that guarantees every
//!   outbound or inbound request carries `x-trace-id`
//! - [`metadata`] - conversion between `tonic::metadata::MetadataMap` and
//!   [`crate::context::CallContext`]

pub mod metadata;
pub mod status;
pub mod trace_interceptor;

pub use metadata::{context_from_metadata, inject_context};
pub use status::http_status;
pub use trace_interceptor::{TraceInterceptor, TRACE_ID_METADATA_KEY};
