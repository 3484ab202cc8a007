//! `reqwest`-backed [`Upstream`].
//!
//! # Responsibilities
//! - Resolve backing URLs, following redirects as configured
//! - Fetch resolved URLs with the client's Range header
//! - Bound both calls with deadlines
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities around `send()` so only the wait for
//!   response headers is bounded, never the streamed body
//! - The resolve response body is dropped unread
//! - No retries: a failed call is terminal for the request

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{LOCATION, RANGE};
use axum::http::HeaderValue;
use hyper::ext::ReasonPhrase;
use reqwest::redirect::Policy;
use tokio::time::timeout;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::error::RelayError;
use crate::relay::upstream::{Upstream, UpstreamResponse};

/// Talks to the storage platform and its CDN over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    follow_redirects: bool,
    forward_empty_range: bool,
    resolve_timeout: Duration,
    relay_timeout: Duration,
}

impl HttpUpstream {
    /// Build the client with the configured redirect policy and timeouts.
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let policy = if upstream.follow_redirects {
            Policy::limited(upstream.max_redirects)
        } else {
            Policy::none()
        };

        let client = reqwest::Client::builder()
            .redirect(policy)
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .user_agent(upstream.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            follow_redirects: upstream.follow_redirects,
            forward_empty_range: upstream.forward_empty_range,
            resolve_timeout: Duration::from_secs(timeouts.resolve_secs),
            relay_timeout: Duration::from_secs(timeouts.relay_secs),
        })
    }
}

fn resolution_error(url: &str, reason: impl Into<String>) -> RelayError {
    RelayError::Resolution {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Log a failed resolve fetch, with a hint for connect-class failures.
fn log_fetch_error(url: &str, error: &reqwest::Error) {
    tracing::error!(url = %url, error = %error, "Resolve fetch failed");

    if error.is_connect() {
        tracing::error!(
            url = %url,
            "Cannot reach the storage platform; check DNS, TLS and upstream.base_url"
        );
    } else if error.is_builder() {
        tracing::error!(url = %url, "Backing URL is malformed");
    } else if error.is_redirect() {
        tracing::error!(url = %url, "Redirect chain exceeded upstream.max_redirects");
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn resolve(&self, backing_url: &str) -> Result<String, RelayError> {
        let request = self.client.get(backing_url).send();
        let response = match timeout(self.resolve_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                log_fetch_error(backing_url, &e);
                return Err(resolution_error(backing_url, e.to_string()));
            }
            Err(_) => {
                tracing::error!(url = %backing_url, "Resolve fetch timed out");
                return Err(resolution_error(
                    backing_url,
                    format!("timed out after {}s", self.resolve_timeout.as_secs()),
                ));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response.url().to_string());
        }

        if !self.follow_redirects && status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| resolution_error(backing_url, format!("{} without Location", status)))?;
            let resolved = response
                .url()
                .join(location)
                .map_err(|e| resolution_error(backing_url, format!("bad Location '{}': {}", location, e)))?;
            return Ok(resolved.to_string());
        }

        Err(resolution_error(backing_url, format!("upstream answered {}", status)))
    }

    async fn fetch_range(
        &self,
        resolved_url: &str,
        range: &HeaderValue,
    ) -> Result<UpstreamResponse, RelayError> {
        let mut request = self.client.get(resolved_url);
        if !range.is_empty() || self.forward_empty_range {
            request = request.header(RANGE, range.clone());
        }

        let response = match timeout(self.relay_timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(RelayError::Relay {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(RelayError::RelayTimeout {
                    secs: self.relay_timeout.as_secs(),
                })
            }
        };

        let status = response.status();
        let reason = response.extensions().get::<ReasonPhrase>().cloned();
        let headers = response.headers().clone();
        let body = Body::from_stream(response.bytes_stream());

        Ok(UpstreamResponse {
            status,
            reason,
            headers,
            body,
        })
    }
}
