//! The seam between the relay pipeline and the network.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use hyper::ext::ReasonPhrase;

use crate::error::RelayError;

/// Response head and body stream of the relay fetch.
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Present when upstream sent a non-canonical reason phrase.
    pub reason: Option<ReasonPhrase>,
    pub headers: HeaderMap,
    pub body: Body,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field(
                "reason",
                &self.reason.as_ref().map(|r| String::from_utf8_lossy(r.as_bytes())),
            )
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// The two network calls a relayed request makes.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Turn a backing URL into the delivery URL it redirects to.
    ///
    /// Every failure is a [`RelayError::Resolution`].
    async fn resolve(&self, backing_url: &str) -> Result<String, RelayError>;

    /// `GET` the resolved URL with `range` as the Range header value.
    ///
    /// `range` is the client's value byte for byte, empty when it sent none.
    /// Failures are [`RelayError::Relay`] or [`RelayError::RelayTimeout`].
    async fn fetch_range(
        &self,
        resolved_url: &str,
        range: &HeaderValue,
    ) -> Result<UpstreamResponse, RelayError>;
}
