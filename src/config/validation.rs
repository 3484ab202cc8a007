//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that upstream URLs and repository identifiers are well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::RelayConfig;
use crate::upload::store::RepoKind;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_socket_addr(&mut errors, "upload.bind_address", &config.upload.bind_address);
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    check_http_url(&mut errors, "upstream.base_url", &config.upstream.base_url);
    check_http_url(&mut errors, "upload.public_base_url", &config.upload.public_base_url);
    check_repo_name(&mut errors, "upstream.namespace", &config.upstream.namespace);
    check_repo_name(&mut errors, "upload.repo_name", &config.upload.repo_name);

    if config.upstream.revision.trim().is_empty() {
        errors.push(ValidationError::new("upstream.revision", "must not be empty"));
    }
    if config.upstream.follow_redirects && config.upstream.max_redirects == 0 {
        errors.push(ValidationError::new(
            "upstream.max_redirects",
            "must be greater than 0 when follow_redirects is enabled",
        ));
    }

    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.resolve_secs", config.timeouts.resolve_secs),
        ("timeouts.relay_secs", config.timeouts.relay_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
    let upstream_secs = config
        .timeouts
        .resolve_secs
        .saturating_add(config.timeouts.relay_secs);
    if config.timeouts.request_secs < upstream_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!(
                "must be at least resolve_secs + relay_secs ({}s)",
                upstream_secs
            ),
        ));
    }

    if config.upload.max_file_size == 0 {
        errors.push(ValidationError::new("upload.max_file_size", "must be greater than 0"));
    }
    if config.upload.repo_type.parse::<RepoKind>().is_err() {
        errors.push(ValidationError::new(
            "upload.repo_type",
            format!("unknown repository type '{}'", config.upload.repo_type),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}

fn check_http_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}

fn check_repo_name(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let valid = value
        .split_once('/')
        .map(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::new(field, format!("'{}' is not in owner/name form", value)));
    }
}
