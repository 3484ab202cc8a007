//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Environment overrides are applied after parsing, before validation.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: RelayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

impl RelayConfig {
    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Load from `path` when given, else from the environment alone.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => load_config(path),
            None => Self::from_env(),
        }
    }
}

/// Apply the environment variables the deployment scripts set.
///
/// `lookup` is injected so tests don't touch the process environment.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup("HUGGINGFACE_TOKEN").filter(|t| !t.is_empty()) {
        config.upload.token = Some(token);
    }
    if let Some(kind) = lookup("DEFAULT_REPO_TYPE") {
        config.upload.repo_type = kind;
    }
    if let Some(name) = lookup("DEFAULT_REPO_NAME") {
        config.upload.repo_name = name;
    }
    if let Some(port) = lookup("PORT") {
        let host = config
            .upload
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.upload.bind_address = format!("{}:{}", host, port);
    }
    if let Some(addr) = lookup("RELAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
}
