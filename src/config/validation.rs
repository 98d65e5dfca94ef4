//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every address parses as an endpoint
//! - Validate value ranges (limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::net::{Endpoint, EndpointError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no listen addresses configured")]
    NoListeners,
    #[error("invalid {field} address {value:?}: {source}")]
    Address {
        field: &'static str,
        value: String,
        source: EndpointError,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.is_empty() {
        errors.push(ValidationError::NoListeners);
    }

    let addresses = std::iter::once(("connect", &config.connect))
        .chain(config.listen.iter().map(|address| ("listen", address)));
    for (field, value) in addresses {
        if let Err(source) = value.parse::<Endpoint>() {
            errors.push(ValidationError::Address {
                field,
                value: value.clone(),
                source,
            });
        }
    }

    let limits = &config.limits;
    for (name, value) in [
        ("limits.read_buffer_bytes", limits.read_buffer_bytes),
        ("limits.max_head_bytes", limits.max_head_bytes),
        ("limits.max_connections", limits.max_connections),
        ("limits.accept_queue", limits.accept_queue),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
