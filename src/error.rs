//! Relay error taxonomy and its mapping to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Body sent when the request path names no file.
pub const MISSING_PATH_MESSAGE: &str = "Vui lòng cung cấp tham số trong URL (ví dụ: /filename.mp4)";

/// Body sent when the resolve step fails.
pub const RESOLUTION_FAILED_MESSAGE: &str = "Không lấy được link gốc";

/// Body sent when the relay fetch fails.
pub const RELAY_FAILED_MESSAGE: &str = "Upstream request failed";

/// Body sent when the relay fetch times out.
pub const RELAY_TIMEOUT_MESSAGE: &str = "Upstream request timed out";

/// Failures of the resolve → relay pipeline.
///
/// The `Display` output is for logs only; callers see the fixed messages
/// produced by [`IntoResponse`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The inbound request carried no logical path.
    #[error("request path is empty")]
    InvalidPath,

    /// The backing URL could not be resolved to a delivery URL.
    #[error("failed to resolve {url}: {reason}")]
    Resolution { url: String, reason: String },

    /// The fetch to the resolved URL failed.
    #[error("relay fetch failed: {reason}")]
    Relay { reason: String },

    /// The fetch to the resolved URL produced no headers in time.
    #[error("relay fetch timed out after {secs}s")]
    RelayTimeout { secs: u64 },
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidPath => StatusCode::BAD_REQUEST,
            RelayError::Resolution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Relay { .. } => StatusCode::BAD_GATEWAY,
            RelayError::RelayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Label used for metrics and structured logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::InvalidPath => "invalid_path",
            RelayError::Resolution { .. } => "resolve_failed",
            RelayError::Relay { .. } => "relay_failed",
            RelayError::RelayTimeout { .. } => "relay_timeout",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            RelayError::InvalidPath => MISSING_PATH_MESSAGE,
            RelayError::Resolution { .. } => RESOLUTION_FAILED_MESSAGE,
            RelayError::Relay { .. } => RELAY_FAILED_MESSAGE,
            RelayError::RelayTimeout { .. } => RELAY_TIMEOUT_MESSAGE,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}
