//! Range-aware redirect relay.
//!
//! # Data Flow
//! ```text
//! LogicalPath
//!     → template.rs (backing resolve URL)
//!     → Upstream::resolve (follow redirects → delivery URL)
//!     → Upstream::fetch_range (GET with the client's Range)
//!     → body.rs (pass-through stream) + http::response (header mapping)
//!     → client
//! ```
//!
//! # Design Decisions
//! - One resolve and one relay call per request, never cached, never retried
//! - The network sits behind the `Upstream` trait; `client.rs` is the
//!   production implementation
//! - Upstream status is copied, never interpreted

pub mod body;
pub mod client;
pub mod template;
pub mod upstream;

use std::sync::Arc;

use axum::body::Body;
use axum::http::HeaderValue;
use axum::response::Response;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::http::request::LogicalPath;
use crate::http::response::relay_response;

pub use body::RelayStream;
pub use client::HttpUpstream;
pub use template::BackingUrlTemplate;
pub use upstream::{Upstream, UpstreamResponse};

/// The resolve → relay pipeline for one storage namespace.
#[derive(Clone)]
pub struct RelayService {
    upstream: Arc<dyn Upstream>,
    template: Arc<BackingUrlTemplate>,
}

impl RelayService {
    pub fn new(upstream: Arc<dyn Upstream>, template: BackingUrlTemplate) -> Self {
        Self {
            upstream,
            template: Arc::new(template),
        }
    }

    /// Production pipeline over HTTP.
    pub fn from_config(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        let upstream = HttpUpstream::new(&config.upstream, &config.timeouts)?;
        Ok(Self::new(
            Arc::new(upstream),
            BackingUrlTemplate::from_config(&config.upstream),
        ))
    }

    pub fn template(&self) -> &BackingUrlTemplate {
        &self.template
    }

    /// Resolve a logical path to its delivery URL.
    pub async fn resolve(&self, path: &LogicalPath) -> Result<String, RelayError> {
        let backing_url = self.template.url_for(path);
        self.upstream.resolve(&backing_url).await
    }

    /// Resolve `path`, fetch it with `range` and wrap the result for the client.
    pub async fn relay(
        &self,
        path: &LogicalPath,
        range: &HeaderValue,
        request_id: &str,
    ) -> Result<Response, RelayError> {
        let resolved_url = self.resolve(path).await?;

        tracing::debug!(
            request_id = %request_id,
            logical_path = %path,
            range = ?range,
            "Resolved, fetching"
        );

        let upstream = self.upstream.fetch_range(&resolved_url, range).await?;
        let stream = RelayStream::new(upstream.body.into_data_stream(), request_id, path.as_str());

        Ok(relay_response(
            upstream.status,
            upstream.reason,
            &upstream.headers,
            Body::from_stream(stream),
        ))
    }
}
