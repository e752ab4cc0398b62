//! Error types surfaced to the reporting sink.
//!
//! # Design Decisions
//! - Public operations never return these; they are logged and, when
//!   reporting is enabled, forwarded to an [`ErrorReporter`](crate::report::ErrorReporter)
//! - Probe failures are folded into `Unavailable`, not propagated

use thiserror::Error;

/// Everything that can go wrong while falling back to the secondary origin.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// A delivery-domain resource failed and was redirected.
    #[error("CDN resource failed to load: <{tag}> {url}, retrying from {fallback}")]
    ResourceFallback {
        tag: String,
        url: String,
        fallback: String,
    },

    /// The fallback origin failed too. Terminal.
    #[error("fallback resource also failed: <{tag}> {url}")]
    FallbackFailed { tag: String, url: String },

    /// The availability probe decided the delivery domain is down.
    #[error("CDN {domain} unreachable, switching page resources to fallback origin")]
    CdnUnavailable { domain: String },

    /// The probe resource could not be fetched.
    #[error("probe request to {url} failed: {reason}")]
    ProbeFailed { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
