//! gRPC status codes as HTTP-style status codes.

use crate::outcome::HasStatusCode;
use tonic::{Code, Status};

/// HTTP-style status code for a gRPC status code.
///
/// Follows the gRPC-to-HTTP mapping used by gRPC gateways, with
/// `DeadlineExceeded` reported as 408 so deadline misses count as dropped
/// calls rather than server errors.
#[must_use]
pub const fn http_status(code: Code) -> i32 {
    match code {
        Code::Ok => 200,
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => 400,
        Code::Unauthenticated => 401,
        Code::PermissionDenied => 403,
        Code::NotFound => 404,
        Code::DeadlineExceeded => 408,
        Code::AlreadyExists | Code::Aborted => 409,
        Code::ResourceExhausted => 429,
        Code::Cancelled => 499,
        Code::Unimplemented => 501,
        Code::Unavailable => 503,
        Code::Unknown | Code::Internal | Code::DataLoss => 500,
    }
}

impl HasStatusCode for Status {
    fn status_code(&self) -> Option<i32> {
        Some(http_status(self.code()))
    }
}
