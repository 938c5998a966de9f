//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate hostnames, scheme and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ApiConfig;

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("api.primary_hostname is empty")]
    EmptyPrimaryHostname,

    #[error("invalid hostname '{0}'")]
    InvalidHostname(String),

    #[error("api.scheme must be http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("api.default_timeout_ms must be greater than 0")]
    ZeroTimeout,

    #[error("failover.resolution.manual_address is required when automatic is false")]
    MissingManualAddress,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let scheme = config.api.scheme.as_str();
    if scheme != "http" && scheme != "https" {
        errors.push(ValidationError::UnsupportedScheme(config.api.scheme.clone()));
    }

    if config.api.primary_hostname.is_empty() {
        errors.push(ValidationError::EmptyPrimaryHostname);
    } else if !is_valid_hostname(&config.api.primary_hostname) {
        errors.push(ValidationError::InvalidHostname(config.api.primary_hostname.clone()));
    }

    for hostname in &config.failover.hostnames {
        if !is_valid_hostname(hostname) {
            errors.push(ValidationError::InvalidHostname(hostname.clone()));
        }
    }

    let resolution = &config.failover.resolution;
    if !resolution.automatic {
        if resolution.manual_address.is_empty() {
            errors.push(ValidationError::MissingManualAddress);
        } else if !is_valid_hostname(&resolution.manual_address) {
            errors.push(ValidationError::InvalidHostname(resolution.manual_address.clone()));
        }
    }

    if config.api.default_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host` or `host:port`, nothing else.
fn is_valid_hostname(hostname: &str) -> bool {
    match Url::parse(&format!("https://{}", hostname)) {
        Ok(url) => url.host_str().is_some() && url.path() == "/" && url.query().is_none(),
        Err(_) => false,
    }
}
