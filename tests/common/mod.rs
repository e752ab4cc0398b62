//! Shared fixtures for integration scenarios.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use cdn_fallback::dom::{self, NodeId, Selector, StyleRule};
use cdn_fallback::ledger::{PENDING_FLAG_ATTR, PENDING_URL_ATTR};
use cdn_fallback::{CdnFallback, Document, ErrorReporter, FallbackError, FallbackOptions, ResourceLoader};

pub const PAGE: &str = "https://app.example/index.html";

/// Probe loader with a switchable outcome.
pub struct ScriptedLoader {
    up: AtomicBool,
    hang: AtomicBool,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    pub fn up() -> Arc<Self> {
        Arc::new(Self::with(true, false))
    }

    pub fn down() -> Arc<Self> {
        Arc::new(Self::with(false, false))
    }

    /// Never answers; only the prober's timeout ends the probe.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self::with(false, true))
    }

    fn with(up: bool, hang: bool) -> Self {
        Self {
            up: AtomicBool::new(up),
            hang: AtomicBool::new(hang),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceLoader for ScriptedLoader {
    async fn load(&self, url: &str) -> Result<(), FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FallbackError::ProbeFailed {
                url: url.to_string(),
                reason: "connection refused".into(),
            })
        }
    }
}

/// Reporter that records the kind of every captured event.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn capture_exception(&self, error: &FallbackError) {
        let kind = match error {
            FallbackError::ResourceFallback { .. } => "resource_fallback",
            FallbackError::FallbackFailed { .. } => "fallback_failed",
            FallbackError::CdnUnavailable { .. } => "cdn_unavailable",
            FallbackError::ProbeFailed { .. } => "probe_failed",
            FallbackError::Http(_) => "http",
        };
        self.events.lock().unwrap().push(kind);
    }
}

pub fn page() -> Document {
    Document::new(Url::parse(PAGE).unwrap())
}

pub fn options() -> FallbackOptions {
    FallbackOptions::new("cdn.example/app")
        .fallback_domain("https://app.example")
        .test_image_path("/probe.gif")
        .enable_reporting(true)
}

pub fn fallback(document: Document, loader: Arc<ScriptedLoader>) -> (CdnFallback, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::default());
    let fallback = CdnFallback::with_loader(document.into_shared(), loader).with_reporter(reporter.clone());
    (fallback, reporter)
}

pub fn background_rule(selector: &str, value: &str, important: bool) -> StyleRule {
    StyleRule {
        selector: Selector::parse(selector).unwrap(),
        background_image: value.to_string(),
        important,
    }
}

/// Let spawned tasks drain without crossing any configured delay.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

/// Stand-in for the lazy-reveal script: lift the deferred class, apply a
/// pending URL if one was left, or call back when flagged.
pub fn reveal(fallback: &CdnFallback, node: NodeId) {
    let deferred_class = fallback
        .config()
        .map(|c| c.deferred_class.clone())
        .unwrap_or_default();

    let callback = {
        let mut doc = dom::lock(fallback.document());
        doc.remove_class(node, &deferred_class);

        let pending_url = doc.attr(node, PENDING_URL_ATTR).map(str::to_string);
        let flagged = doc.attr(node, PENDING_FLAG_ATTR).is_some();
        doc.remove_attr(node, PENDING_FLAG_ATTR);

        match pending_url {
            Some(url) => {
                doc.set_style_property(node, "background-image", &format!("url(\"{}\")", url));
                doc.remove_attr(node, PENDING_URL_ATTR);
                false
            }
            None => flagged,
        }
    };

    if callback {
        fallback.replace_background(node);
    }
}
