//! Configuration schema definitions.
//!
//! [`FallbackOptions`] is what callers hand to `init` (every field optional),
//! [`FallbackConfig`] is the resolved form the engine reads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default probe timeout in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;

/// Default class used by the deferred-loading convention.
pub const DEFAULT_DEFERRED_CLASS: &str = "lazy-bg";

/// Default delay before the bulk pass re-walks all elements.
pub const DEFAULT_RESCAN_DELAY_MS: u64 = 1000;

/// Default delay before backgrounds of inserted nodes are read.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;

/// Initialization options.
///
/// Keys are snake_case; the camelCase names used by page scripts
/// (`cdnDomain`, `testImagePath`, ...) are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FallbackOptions {
    /// Delivery domain: host plus optional path prefix, no scheme.
    #[serde(alias = "cdnDomain")]
    pub cdn_domain: Option<String>,

    /// Fallback origin. Defaults to the page origin.
    #[serde(alias = "fallbackDomain")]
    pub fallback_domain: Option<String>,

    /// Probe timeout in milliseconds.
    #[serde(alias = "testTimeout")]
    pub test_timeout: Option<u64>,

    /// Path of the probe image on the delivery domain. Absence disables
    /// background-image fallback.
    #[serde(alias = "testImagePath")]
    pub test_image_path: Option<String>,

    /// Forward fallback events to the reporting sink.
    #[serde(alias = "enableSentry", alias = "enableReporting")]
    pub enable_reporting: Option<bool>,

    /// Class that suppresses a background image until revealed.
    #[serde(alias = "deferredClass")]
    pub deferred_class: Option<String>,

    /// Delay before the bulk pass re-walks the document, in milliseconds.
    #[serde(alias = "rescanDelay")]
    pub rescan_delay_ms: Option<u64>,

    /// Delay before inserted nodes have their backgrounds read, in milliseconds.
    #[serde(alias = "settleDelay")]
    pub settle_delay_ms: Option<u64>,
}

impl FallbackOptions {
    /// Options with just the delivery domain set.
    pub fn new(cdn_domain: impl Into<String>) -> Self {
        Self {
            cdn_domain: Some(cdn_domain.into()),
            ..Self::default()
        }
    }

    pub fn fallback_domain(mut self, origin: impl Into<String>) -> Self {
        self.fallback_domain = Some(origin.into());
        self
    }

    pub fn test_image_path(mut self, path: impl Into<String>) -> Self {
        self.test_image_path = Some(path.into());
        self
    }

    pub fn test_timeout(mut self, ms: u64) -> Self {
        self.test_timeout = Some(ms);
        self
    }

    pub fn enable_reporting(mut self, enabled: bool) -> Self {
        self.enable_reporting = Some(enabled);
        self
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    pub fn merge(self, other: FallbackOptions) -> Self {
        Self {
            cdn_domain: other.cdn_domain.or(self.cdn_domain),
            fallback_domain: other.fallback_domain.or(self.fallback_domain),
            test_timeout: other.test_timeout.or(self.test_timeout),
            test_image_path: other.test_image_path.or(self.test_image_path),
            enable_reporting: other.enable_reporting.or(self.enable_reporting),
            deferred_class: other.deferred_class.or(self.deferred_class),
            rescan_delay_ms: other.rescan_delay_ms.or(self.rescan_delay_ms),
            settle_delay_ms: other.settle_delay_ms.or(self.settle_delay_ms),
        }
    }
}

/// Resolved configuration for one session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FallbackConfig {
    /// Host plus optional path prefix of the delivery domain.
    pub delivery_domain: String,

    /// Origin resources are redirected to, without trailing slash.
    pub fallback_origin: String,

    /// How long the probe waits before declaring the domain unreachable.
    pub probe_timeout_ms: u64,

    /// Probe image path. `None` disables background-image fallback.
    pub probe_resource_path: Option<String>,

    /// Forward fallback events to the reporting sink.
    pub reporting_enabled: bool,

    /// Class that suppresses a background image until revealed.
    pub deferred_class: String,

    pub rescan_delay_ms: u64,

    pub settle_delay_ms: u64,
}

impl FallbackConfig {
    /// Merge `options` over the defaults. An empty fallback origin resolves
    /// to `page_origin`.
    pub fn resolve(options: FallbackOptions, page_origin: &str) -> Self {
        let fallback = options
            .fallback_domain
            .filter(|origin| !origin.is_empty())
            .unwrap_or_else(|| page_origin.to_string());

        Self {
            delivery_domain: options.cdn_domain.unwrap_or_default(),
            fallback_origin: fallback.trim_end_matches('/').to_string(),
            probe_timeout_ms: options.test_timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT_MS),
            probe_resource_path: options.test_image_path.filter(|p| !p.is_empty()),
            reporting_enabled: options.enable_reporting.unwrap_or(false),
            deferred_class: options
                .deferred_class
                .unwrap_or_else(|| DEFAULT_DEFERRED_CLASS.to_string()),
            rescan_delay_ms: options.rescan_delay_ms.unwrap_or(DEFAULT_RESCAN_DELAY_MS),
            settle_delay_ms: options.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
        }
    }

    /// Background-image fallback is keyed off the probe path being configured.
    pub fn background_enabled(&self) -> bool {
        self.probe_resource_path.is_some()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// URL of the probe image on the delivery domain, without cache buster.
    pub fn probe_url(&self, scheme: &str) -> Option<String> {
        let path = self.probe_resource_path.as_deref()?;
        let domain = self.delivery_domain.trim_end_matches('/');
        if path.starts_with('/') {
            Some(format!("{}://{}{}", scheme, domain, path))
        } else {
            Some(format!("{}://{}/{}", scheme, domain, path))
        }
    }
}
