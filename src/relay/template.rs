//! Backing URL construction.

use crate::config::UpstreamConfig;
use crate::http::request::LogicalPath;

/// Builds the canonical resolve URL for a logical path:
/// `{base_url}/datasets/{namespace}/resolve/{revision}/{path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingUrlTemplate {
    prefix: String,
}

impl BackingUrlTemplate {
    pub fn new(base_url: &str, namespace: &str, revision: &str) -> Self {
        let prefix = format!(
            "{}/datasets/{}/resolve/{}/",
            base_url.trim_end_matches('/'),
            namespace.trim_matches('/'),
            revision,
        );
        Self { prefix }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(&config.base_url, &config.namespace, &config.revision)
    }

    /// Substitute `path` into the template, percent-encoding each segment.
    pub fn url_for(&self, path: &LogicalPath) -> String {
        let encoded = path
            .as_str()
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{}", self.prefix, encoded)
    }
}
