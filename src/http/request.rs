//! Request handling.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) when the client sent none
//! - Extract the logical path the client asked for
//! - Read the Range header that is forwarded upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The logical path is validated before any network call

use std::fmt;

use axum::http::{header::RANGE, HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::RelayError;

/// Header carrying the request ID in both directions.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a UUID v4 request ID for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Request ID of an inbound request, or "unknown" outside the request-id layer.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Inbound Range value, byte for byte; empty when the client sent none.
pub fn range_header(headers: &HeaderMap) -> HeaderValue {
    headers
        .get(RANGE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(""))
}

/// The caller-facing name of a file, as taken from the request path.
///
/// Always non-empty. Holds the percent-decoded form; re-encoding happens
/// when the backing URL is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPath(String);

impl LogicalPath {
    /// Strip the leading separator from a URI path and decode it.
    pub fn from_uri_path(path: &str) -> Result<Self, RelayError> {
        let raw = path.strip_prefix('/').unwrap_or(path);
        let decoded = match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        };

        if decoded.is_empty() {
            return Err(RelayError::InvalidPath);
        }
        Ok(Self(decoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
