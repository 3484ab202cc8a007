//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay
//! and the upload server. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration shared by the relay server, the upload server and the CLI.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration for the relay server.
    pub listener: ListenerConfig,

    /// Storage platform the relay resolves logical paths against.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Upload server and hub API settings.
    pub upload: UploadConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream storage platform.
///
/// The resolve URL for a logical path is
/// `{base_url}/datasets/{namespace}/resolve/{revision}/{path}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Scheme and host of the platform (e.g., "https://huggingface.co").
    pub base_url: String,

    /// Dataset namespace in `owner/name` form.
    pub namespace: String,

    /// Branch or commit the resolve URL points at.
    pub revision: String,

    /// Let the transport follow the redirect chain during resolution.
    /// When false a single redirect hop is resolved from its `Location`.
    pub follow_redirects: bool,

    /// Maximum redirect hops when `follow_redirects` is set.
    pub max_redirects: usize,

    /// Send `Range:` with an empty value when the client sent no Range.
    pub forward_empty_range: bool,

    /// User-Agent sent on upstream requests.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://huggingface.co".to_string(),
            namespace: "datalocalapi/data1".to_string(),
            revision: "main".to_string(),
            follow_redirects: true,
            max_redirects: 10,
            forward_empty_range: true,
            user_agent: concat!("range-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Whole resolve call (including redirects) in seconds.
    pub resolve_secs: u64,

    /// Relay call until response headers arrive, in seconds.
    /// The streamed body is not bounded.
    pub relay_secs: u64,

    /// Server-side bound on producing response headers, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            resolve_secs: 15,
            relay_secs: 30,
            request_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Upload server and hub API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Upload server bind address.
    pub bind_address: String,

    /// Directory uploaded files are staged in before forwarding.
    pub staging_dir: String,

    /// Per-file size limit in bytes.
    pub max_file_size: usize,

    /// Base of the links handed back to uploaders (the relay's public address).
    pub public_base_url: String,

    /// Default repository kind ("dataset", "model" or "space").
    pub repo_type: String,

    /// Default repository in `owner/name` form.
    pub repo_name: String,

    /// License set on repositories the server creates.
    pub license: String,

    /// Hub access token. Usually supplied through `HUGGINGFACE_TOKEN`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            staging_dir: "uploads".to_string(),
            max_file_size: 100 * 1024 * 1024, // 100MB
            public_base_url: "http://localhost:8080".to_string(),
            repo_type: "dataset".to_string(),
            repo_name: "datalocalapi/data1".to_string(),
            license: "mit".to_string(),
            token: None,
        }
    }
}
