//! Structured RPC error.
//!
//! `RpcError` is the error shape services return across process boundaries:
//! an originating id, an HTTP-style numeric code, a human readable detail and
//! the canonical status text for the code.
//!
//! Its `Display` form is its compact JSON encoding, e.g.
//!
//! ```text
//! {"id":"greeter","code":404,"detail":"no such greeting","status":"Not Found"}
//! ```
//!
//! so an error that crosses a transport as plain text still carries a
//! `"code":NNN` marker that the outcome classifier can recover.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error carrying a numeric status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Identifier of the service or component that produced the error.
    pub id: String,
    /// HTTP-style status code (4xx client errors, 5xx server errors).
    pub code: i32,
    /// Human readable detail.
    pub detail: String,
    /// Canonical status text for `code`.
    pub status: String,
}

impl RpcError {
    /// Create an error with an explicit code.
    pub fn new(id: impl Into<String>, code: i32, detail: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code,
            detail: detail.into(),
            status: status_text(code).to_string(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, 400, detail)
    }

    /// 401 Unauthorized.
    pub fn unauthorized(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, 401, detail)
    }

    /// 403 Forbidden.
    pub fn forbidden(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, 403, detail)
    }

    /// 404 Not Found.
    pub fn not_found(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, 404, detail)
    }

    /// 408 Request Timeout.
    pub fn timeout(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, 408, detail)
    }

    /// 500 Internal Server Error.
    pub fn internal_server_error(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, 500, detail)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            // Fallback keeps the `"code":` marker
            Err(_) => write!(
                f,
                "{{\"id\":{:?},\"code\":{},\"detail\":{:?},\"status\":{:?}}}",
                self.id, self.code, self.detail, self.status
            ),
        }
    }
}

impl std::error::Error for RpcError {}

/// Canonical status text for the codes services commonly return.
#[must_use]
pub fn status_text(code: i32) -> &'static str {
    match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        429 => "Too Many Requests",
        499 => "Client Closed Request",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
