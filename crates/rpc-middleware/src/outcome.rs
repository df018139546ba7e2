//! Outcome classification.
//!
//! Maps the terminal result of an operation to exactly one [`Outcome`]
//! bucket. Errors are inspected in two explicit steps:
//!
//! 1. Structured code: the error is (or wraps) a type with a known status
//!    code: [`RpcError`], `tonic::Status`, or an application type registered
//!    through [`HasStatusCode`] and [`code_extractor`].
//! 2. [`code_from_message`]: otherwise scan the error text for a
//!    `"code":` marker followed by a fixed-width three character code.
//!    This recovers codes from structured errors that crossed a transport
//!    as plain text. No marker, or an unparsable code, means 500.
//!
//! # Buckets
//!
//! | Code            | Outcome         |
//! |-----------------|-----------------|
//! | (no error)      | `success`       |
//! | 408             | `dropped`       |
//! | 400-499 \ {408} | `bad-request`   |
//! | anything else   | `internal-error`|

use crate::grpc::http_status;
use common::error::BoxError;
use common::rpc_error::RpcError;
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;

/// Code assumed when an error carries no recoverable status code.
pub const DEFAULT_ERROR_CODE: i32 = 500;

/// Code that marks a dropped (timed out) call.
pub const TIMEOUT_CODE: i32 = 408;

/// Marker preceding a status code inside serialized error text.
const CODE_MARKER: &str = "\"code\":";

/// Number of characters taken after [`CODE_MARKER`].
const CODE_WIDTH: usize = 3;

/// How an operation terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// No error.
    Success,
    /// Client-caused error (4xx except 408).
    BadRequest,
    /// Timed out (408).
    Dropped,
    /// Everything else, including errors with no recoverable code.
    InternalError,
}

impl Outcome {
    /// Every bucket, in histogram creation order.
    pub const ALL: [Outcome; 4] = [
        Outcome::Success,
        Outcome::BadRequest,
        Outcome::Dropped,
        Outcome::InternalError,
    ];

    /// Returns the outcome as a string for log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::BadRequest => "bad-request",
            Outcome::Dropped => "dropped",
            Outcome::InternalError => "internal-error",
        }
    }

    /// Suffix of the per-bucket histogram name (`<name>.<suffix>`).
    #[must_use]
    pub const fn histogram_suffix(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::BadRequest => "bad",
            Outcome::Dropped => "dropped",
            Outcome::InternalError => "errors",
        }
    }

    /// Bucket for an error carrying `code`.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            TIMEOUT_CODE => Outcome::Dropped,
            400..=499 => Outcome::BadRequest,
            _ => Outcome::InternalError,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opt-in capability of an error type to report its own status code.
///
/// Not required by the classifier. Implement it for an application error
/// type and register the type with [`code_extractor`] (or
/// `MetricsLayer::with_status_code`) so its code is read directly instead
/// of being recovered from text.
pub trait HasStatusCode {
    /// HTTP-style status code, if the error carries one.
    fn status_code(&self) -> Option<i32>;
}

impl HasStatusCode for RpcError {
    fn status_code(&self) -> Option<i32> {
        Some(self.code)
    }
}

/// Reads a status code from a type-erased error, `None` if the type is not
/// recognized.
pub type CodeExtractor = fn(&dyn Any) -> Option<i32>;

/// Extractor reading the code of `E` through its [`HasStatusCode`] impl.
#[must_use]
pub fn code_extractor<E: HasStatusCode + 'static>() -> CodeExtractor {
    |error| error.downcast_ref::<E>().and_then(HasStatusCode::status_code)
}

/// Structured code of the error types known to this crate.
///
/// Boxed errors and `std::io::Error` payloads are unwrapped and their
/// source chains searched.
fn known_code(error: &dyn Any) -> Option<i32> {
    if let Some(rpc) = error.downcast_ref::<RpcError>() {
        return Some(rpc.code);
    }
    if let Some(status) = error.downcast_ref::<tonic::Status>() {
        return Some(http_status(status.code()));
    }
    if let Some(boxed) = error.downcast_ref::<BoxError>() {
        return chain_code(&**boxed);
    }
    if let Some(io) = error.downcast_ref::<std::io::Error>() {
        return io.get_ref().and_then(|inner| chain_code(inner));
    }
    None
}

/// Walks a source chain looking for an error type that carries a code.
fn chain_code(error: &(dyn StdError + 'static)) -> Option<i32> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(rpc) = err.downcast_ref::<RpcError>() {
            return Some(rpc.code);
        }
        if let Some(status) = err.downcast_ref::<tonic::Status>() {
            return Some(http_status(status.code()));
        }
        current = err.source();
    }
    None
}

/// Recover a status code from error text.
///
/// Takes exactly the three characters following the first `"code":` marker
/// and parses them as an integer. Returns [`DEFAULT_ERROR_CODE`] when the
/// marker is missing, fewer than three characters follow it, or they do
/// not parse.
#[must_use]
pub fn code_from_message(message: &str) -> i32 {
    let Some(marker) = message.find(CODE_MARKER) else {
        return DEFAULT_ERROR_CODE;
    };
    let start = marker + CODE_MARKER.len();

    message
        .get(start..start + CODE_WIDTH)
        .and_then(|digits| digits.parse::<i32>().ok())
        .unwrap_or(DEFAULT_ERROR_CODE)
}

/// Status code of an error.
///
/// Registered `extractors` are tried first, then the error types this crate
/// knows about, then the text scan.
pub fn status_code_of<E>(error: &E, extractors: &[CodeExtractor]) -> i32
where
    E: fmt::Display + 'static,
{
    let erased: &dyn Any = error;
    extractors
        .iter()
        .find_map(|extract| extract(erased))
        .or_else(|| known_code(erased))
        .unwrap_or_else(|| code_from_message(&error.to_string()))
}

/// Classify the terminal error of an operation (`None` = success).
///
/// Any displayable error can be classified; see [`classify_with`] to read
/// codes from application error types.
pub fn classify<E>(error: Option<&E>) -> Outcome
where
    E: fmt::Display + 'static,
{
    classify_with(error, &[])
}

/// [`classify`] with additional code extractors tried first.
pub fn classify_with<E>(error: Option<&E>, extractors: &[CodeExtractor]) -> Outcome
where
    E: fmt::Display + 'static,
{
    match error {
        None => Outcome::Success,
        Some(err) => Outcome::from_code(status_code_of(err, extractors)),
    }
}
