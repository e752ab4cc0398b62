//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of file-based options (serde handles syntactic)
//! - Check the delivery domain is present and scheme-less
//! - Validate the fallback origin and probe timeout
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Only the file loader runs this; `init` trusts its caller

use thiserror::Error;
use url::Url;

use crate::config::schema::FallbackOptions;

/// A single semantic problem with a set of options.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cdn_domain is required")]
    MissingCdnDomain,

    #[error("cdn_domain must not include a scheme: {0}")]
    SchemeInCdnDomain(String),

    #[error("fallback_domain is not an http(s) origin: {0}")]
    InvalidFallbackDomain(String),

    #[error("test_timeout must be greater than zero")]
    ZeroTimeout,
}

/// Validate options, collecting every error.
pub fn validate_options(options: &FallbackOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match options.cdn_domain.as_deref() {
        None | Some("") => errors.push(ValidationError::MissingCdnDomain),
        Some(domain) if domain.contains("://") || domain.starts_with("//") => {
            errors.push(ValidationError::SchemeInCdnDomain(domain.to_string()));
        }
        Some(_) => {}
    }

    if let Some(origin) = options.fallback_domain.as_deref().filter(|o| !o.is_empty()) {
        let valid = Url::parse(origin)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidFallbackDomain(origin.to_string()));
        }
    }

    if options.test_timeout == Some(0) {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
