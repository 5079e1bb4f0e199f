//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Target URL must be an absolute http/https URL
//! - At least one listener must be able to run
//! - Validate value ranges (hop limit > 0, distinct ports)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("target URL is not specified")]
    MissingTarget,

    #[error("target URL {url:?} is invalid: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("no listener enabled: set an HTTP port, or an HTTPS port with a certificate source")]
    NoListener,

    #[error("HTTP and HTTPS listeners share port {0}")]
    PortConflict(u16),

    #[error("redirects.max_hops must be greater than zero")]
    ZeroHopLimit,

    #[error("domain {0:?} is not a valid DNS name")]
    InvalidDomain(String),

    #[error("only one of tls.cert_path and tls.key_path is set")]
    IncompleteStaticCertificate,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.target_url.trim().is_empty() {
        errors.push(ValidationError::MissingTarget);
    } else if let Err(reason) = check_target(&config.target_url) {
        errors.push(ValidationError::InvalidTarget {
            url: config.target_url.clone(),
            reason,
        });
    }

    let tls_source = config.tls.source();
    match (config.listener.http_port, config.listener.https_port) {
        (None, None) => errors.push(ValidationError::NoListener),
        (None, Some(_)) if tls_source.is_none() => errors.push(ValidationError::NoListener),
        (Some(http), Some(https)) if http == https && tls_source.is_some() => {
            errors.push(ValidationError::PortConflict(http))
        }
        _ => {}
    }

    if config.tls.cert_path.is_some() != config.tls.key_path.is_some() {
        errors.push(ValidationError::IncompleteStaticCertificate);
    }

    if let Some(domain) = &config.tls.domain {
        if !is_dns_name(domain) {
            errors.push(ValidationError::InvalidDomain(domain.clone()));
        }
    }

    if config.redirects.max_hops == 0 {
        errors.push(ValidationError::ZeroHopLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_target(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {other:?}")),
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

fn is_dns_name(domain: &str) -> bool {
    !domain.is_empty()
        && domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
