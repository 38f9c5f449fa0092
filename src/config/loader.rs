//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::FulcrumConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

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

/// Load and validate configuration from a JSON or TOML file.
///
/// Files with a `.toml` extension are parsed as TOML; anything else is
/// treated as JSON (the `config.json` layout).
pub fn load_config(path: &Path) -> Result<FulcrumConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config = if is_toml {
        parse_toml(&content)?
    } else {
        parse_json(&content)?
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a JSON document without validating it.
pub fn parse_json(content: &str) -> Result<FulcrumConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

/// Parse a TOML document without validating it.
pub fn parse_toml(content: &str) -> Result<FulcrumConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}
