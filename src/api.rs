//! Public entry point.
//!
//! # Responsibilities
//! - Configure a session (`init`) and launch the availability probe
//! - Attach the load-failure listener and the insertion watcher
//! - Expose manual triggers: probe, bulk pass, single/subtree background
//! - Expose read-only config and probe snapshots
//!
//! # Lifecycle
//! ```text
//! init(options)
//!     → resolve config, reset probe to Unknown
//!     → attach listener + watcher (first init only)
//!     → spawn probe
//!         Unavailable → replace_all (bulk pass, rescan queued)
//!         Available   → only isolated failures are handled
//! ```
//!
//! # Design Decisions
//! - Never panics and never returns errors; calls made before `init`
//!   log a warning and do nothing
//! - The document lock is never held across an await point
//! - Background tasks hold a weak handle and stop once the instance drops

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use tokio::runtime::Handle;

use crate::config::{FallbackConfig, FallbackOptions};
use crate::dom::{self, EventStream, LoadEvent, NodeId, Selector, SharedDocument};
use crate::engine::{background, listener, resources, watcher, Continuation, FallbackContext};
use crate::error::FallbackError;
use crate::probe::loader::{HttpLoader, ResourceLoader};
use crate::probe::{Availability, Prober};
use crate::report::ErrorReporter;

/// Element to run `check_element` against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTarget<'a> {
    Node(NodeId),
    /// First element matching the selector.
    Selector(&'a str),
}

impl From<NodeId> for ElementTarget<'_> {
    fn from(node: NodeId) -> Self {
        ElementTarget::Node(node)
    }
}

impl<'a> From<&'a str> for ElementTarget<'a> {
    fn from(selector: &'a str) -> Self {
        ElementTarget::Selector(selector)
    }
}

struct Inner {
    document: SharedDocument,
    session: ArcSwapOption<FallbackContext>,
    prober: Prober,
    reporter: Option<Arc<dyn ErrorReporter>>,
    attached: AtomicBool,
}

/// CDN fallback for one document.
#[derive(Clone)]
pub struct CdnFallback {
    inner: Arc<Inner>,
}

impl CdnFallback {
    /// Create an instance probing over HTTP.
    pub fn new(document: SharedDocument) -> Self {
        Self::with_loader(document, Arc::new(HttpLoader::new()))
    }

    /// Create an instance with a custom probe loader.
    pub fn with_loader(document: SharedDocument, loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            inner: Arc::new(Inner {
                document,
                session: ArcSwapOption::empty(),
                prober: Prober::new(loader),
                reporter: None,
                attached: AtomicBool::new(false),
            }),
        }
    }

    /// Install the reporting sink. Must be called before the first clone
    /// or `init`; later calls are ignored.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.reporter = Some(reporter),
            None => tracing::warn!("Reporter must be installed before the instance is shared"),
        }
        self
    }

    pub fn document(&self) -> &SharedDocument {
        &self.inner.document
    }

    /// Start a session. A repeated call replaces the configuration and
    /// resets the probe result; timers from the previous session still run.
    pub fn init(&self, options: FallbackOptions) {
        let origin = dom::lock(&self.inner.document).origin();
        let config = FallbackConfig::resolve(options, &origin);

        tracing::info!(
            cdn_domain = %config.delivery_domain,
            fallback_origin = %config.fallback_origin,
            background = config.background_enabled(),
            "CDN fallback initialized"
        );

        let ctx = Arc::new(FallbackContext::new(config, self.inner.reporter.clone()));
        self.inner.session.store(Some(ctx));
        self.inner.prober.reset();

        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("No async runtime; probe, listener and watcher not started");
            return;
        };

        if !self.inner.attached.swap(true, Ordering::AcqRel) {
            let (loads, mutations) = {
                let mut doc = dom::lock(&self.inner.document);
                (doc.observe_loads(), doc.observe_mutations())
            };
            handle.spawn(run_listener(Arc::downgrade(&self.inner), loads));
            handle.spawn(run_watcher(Arc::downgrade(&self.inner), mutations));
        }

        let this = self.clone();
        handle.spawn(async move {
            if this.test().await == Availability::Unavailable {
                this.replace_all();
            }
        });
    }

    fn session(&self) -> Option<Arc<FallbackContext>> {
        let session = self.inner.session.load_full();
        if session.is_none() {
            tracing::warn!("CDN fallback used before init");
        }
        session
    }

    /// Probe availability, reusing a decided result.
    pub async fn test(&self) -> Availability {
        let Some(ctx) = self.session() else {
            return Availability::Unknown;
        };
        let scheme = dom::lock(&self.inner.document).scheme().to_string();
        self.inner.prober.probe(&ctx.config, &scheme).await
    }

    /// Discard the decided result and probe again.
    pub async fn retest(&self) -> Availability {
        if self.inner.session.load().is_some() {
            self.inner.prober.reset();
        }
        self.test().await
    }

    /// Rewrite every delivery-domain resource now.
    pub fn replace_all(&self) {
        let Some(ctx) = self.session() else {
            return;
        };
        let mut queue = Vec::new();
        {
            let mut doc = dom::lock(&self.inner.document);
            resources::replace_all(&mut doc, &ctx, &mut queue);
        }
        ctx.report(FallbackError::CdnUnavailable {
            domain: ctx.config.delivery_domain.clone(),
        });
        schedule(&self.inner, &ctx, queue);
    }

    /// Apply background fallback to a single element. This is what the
    /// deferred-reveal collaborator calls for flagged elements.
    pub fn replace_background(&self, node: NodeId) -> bool {
        let Some(ctx) = self.session() else {
            return false;
        };
        let mut doc = dom::lock(&self.inner.document);
        background::replace_background(&mut doc, &ctx, node)
    }

    /// Apply background fallback to an element and all its descendants.
    /// Returns how many elements were rewritten.
    pub fn check_element<'a>(&self, target: impl Into<ElementTarget<'a>>) -> usize {
        let Some(ctx) = self.session() else {
            return 0;
        };
        if !ctx.config.background_enabled() {
            tracing::debug!("Background fallback disabled, nothing to check");
            return 0;
        }

        let mut doc = dom::lock(&self.inner.document);
        let root = match target.into() {
            ElementTarget::Node(node) => Some(node),
            ElementTarget::Selector(selector) => match Selector::parse(selector) {
                Ok(selector) => doc.query_selector(&selector),
                Err(e) => {
                    tracing::warn!(error = %e, "check_element: invalid selector");
                    None
                }
            },
        };
        let Some(root) = root.filter(|node| doc.element(*node).is_some()) else {
            return 0;
        };
        background::check_subtree(&mut doc, &ctx, root)
    }

    /// Snapshot of the active configuration, `None` before `init`.
    pub fn config(&self) -> Option<Arc<FallbackConfig>> {
        self.inner.session.load().as_ref().map(|ctx| ctx.config.clone())
    }

    /// Current probe result.
    pub fn cdn_available(&self) -> Availability {
        self.inner.prober.availability()
    }
}

/// Spawn each continuation after its delay, under the context it was queued with.
fn schedule(inner: &Arc<Inner>, ctx: &Arc<FallbackContext>, queue: Vec<Continuation>) {
    if queue.is_empty() {
        return;
    }
    let Ok(handle) = Handle::try_current() else {
        tracing::warn!(pending = queue.len(), "No async runtime; deferred fallback steps dropped");
        return;
    };

    for continuation in queue {
        let inner = inner.clone();
        let ctx = ctx.clone();
        handle.spawn(async move {
            continuation.delay(&ctx.config).wait().await;
            let mut doc = dom::lock(&inner.document);
            continuation.run(&mut doc, &ctx);
        });
    }
}

async fn run_listener(inner: Weak<Inner>, mut loads: EventStream<LoadEvent>) {
    while let Some(event) = loads.next().await {
        let Some(this) = inner.upgrade() else {
            break;
        };
        let Some(ctx) = this.session.load_full() else {
            continue;
        };
        let mut queue = Vec::new();
        {
            let mut doc = dom::lock(&this.document);
            listener::on_load_event(&mut doc, &ctx, event, &mut queue);
        }
        schedule(&this, &ctx, queue);
    }
}

async fn run_watcher(inner: Weak<Inner>, mut mutations: EventStream<NodeId>) {
    while let Some(node) = mutations.next().await {
        let Some(this) = inner.upgrade() else {
            break;
        };
        if this.prober.availability() != Availability::Unavailable {
            tracing::trace!("Ignoring insertion while CDN is not known to be down");
            continue;
        }
        let Some(ctx) = this.session.load_full() else {
            continue;
        };
        let mut queue = Vec::new();
        {
            let mut doc = dom::lock(&this.document);
            watcher::process_inserted(&mut doc, &ctx, node, &mut queue);
        }
        schedule(&this, &ctx, queue);
    }
}
