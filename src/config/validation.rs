//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Parse backend addresses into URLs
//! - Reject duplicate backends so address lookups are unambiguous
//! - Validate value ranges (intervals and timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FulcrumConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::FulcrumConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("invalid backend URL {address:?}: {reason}")]
    InvalidBackendUrl { address: String, reason: String },

    #[error("backend {address:?} uses unsupported scheme {scheme:?} (only http is supported)")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("backend {address:?} has no host")]
    MissingHost { address: String },

    #[error("duplicate backend {address:?}")]
    DuplicateBackend { address: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Parse the configured backend list, collecting every error.
pub fn parse_backends(addresses: &[String]) -> Result<Vec<Url>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut urls = Vec::with_capacity(addresses.len());

    if addresses.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    for address in addresses {
        let url = match Url::parse(address.trim()) {
            Ok(url) => url,
            Err(e) => {
                errors.push(ValidationError::InvalidBackendUrl {
                    address: address.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if url.scheme() != "http" {
            errors.push(ValidationError::UnsupportedScheme {
                address: address.clone(),
                scheme: url.scheme().to_string(),
            });
            continue;
        }

        if url.host_str().map_or(true, str::is_empty) {
            errors.push(ValidationError::MissingHost {
                address: address.clone(),
            });
            continue;
        }

        // Url normalizes (lowercase host, default port, trailing slash), so
        // "http://A:80" and "http://a/" collide here as they would at runtime.
        if !seen.insert(url.as_str().to_string()) {
            errors.push(ValidationError::DuplicateBackend {
                address: address.clone(),
            });
            continue;
        }

        urls.push(url);
    }

    if errors.is_empty() {
        Ok(urls)
    } else {
        Err(errors)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &FulcrumConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = match parse_backends(&config.backends) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    };

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health_check.interval_secs" });
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "health_check.timeout_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
