//! Delivery-domain URL rewriting.
//!
//! # Design Decisions
//! - Membership is a plain substring test on the configured delivery domain;
//!   a fallback origin that happens to contain it is a known false positive
//! - Rewriting swaps the `scheme://host/` prefix anchored at the start of
//!   the string and keeps everything after it verbatim, path prefix
//!   included, so `//cdn.example/app/x` maps to `<fallback>/app/x`
//! - `srcset` lists go through the same replace; only a leading match is
//!   rewritten, later candidates are not parsed out

use regex::{NoExpand, Regex};

use crate::config::FallbackConfig;

/// Maps delivery-domain URLs onto the fallback origin.
#[derive(Debug, Clone)]
pub struct UrlRewriter {
    delivery_domain: String,
    replacement: String,
    prefix: Option<Regex>,
}

impl UrlRewriter {
    pub fn new(delivery_domain: &str, fallback_origin: &str) -> Self {
        let host = delivery_domain
            .trim_start_matches("//")
            .split('/')
            .next()
            .unwrap_or_default();
        let pattern = format!("^(?:https?:)?//{}/", regex::escape(host));
        let prefix = match Regex::new(&pattern) {
            Ok(prefix) => Some(prefix),
            Err(e) => {
                tracing::warn!(domain = %delivery_domain, error = %e, "Delivery domain not usable as a URL prefix");
                None
            }
        };

        Self {
            delivery_domain: delivery_domain.to_string(),
            replacement: format!("{}/", fallback_origin),
            prefix,
        }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(&config.delivery_domain, &config.fallback_origin)
    }

    /// True when `url` mentions the delivery domain anywhere.
    pub fn is_delivery_url(&self, url: &str) -> bool {
        !self.delivery_domain.is_empty() && url.contains(&self.delivery_domain)
    }

    /// Swap a leading delivery-domain prefix for the fallback origin.
    /// Without a usable prefix the URL comes back unchanged.
    pub fn rewrite(&self, url: &str) -> String {
        match &self.prefix {
            Some(prefix) => prefix.replace(url, NoExpand(&self.replacement)).into_owned(),
            None => url.to_string(),
        }
    }
}
