//! Fallback engines.
//!
//! # Data Flow
//! ```text
//! load failure  → listener.rs  → resources.rs (per-element strategy)
//! probe = down  → resources.rs::replace_all → background.rs::replace_all
//! insertion     → watcher.rs   → resources.rs + background.rs
//!
//! Every pass runs synchronously over &mut Document and pushes
//! Continuations; the caller releases the document and schedules them.
//! ```
//!
//! # Ordering Guarantees
//! - `AssignSource` runs after a `NextTick` yield, strictly after the
//!   synchronous `src` removal that queued it
//! - `ReplaceBackground` runs after `settle_delay`, giving styles inserted
//!   alongside the node time to apply
//! - `Rescan` runs after `rescan_delay`, once, per bulk pass
//! - Continuations keep the context they were queued under; a later
//!   `init` does not cancel them

pub mod background;
pub mod listener;
pub mod resources;
pub mod watcher;

use std::sync::Arc;
use std::time::Duration;

use crate::config::FallbackConfig;
use crate::dom::{Document, NodeId};
use crate::error::FallbackError;
use crate::report::ErrorReporter;
use crate::rewrite::UrlRewriter;

/// Everything an engine pass needs besides the document.
pub struct FallbackContext {
    pub config: Arc<FallbackConfig>,
    pub rewriter: UrlRewriter,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl FallbackContext {
    /// Build a context. `reporter` is only kept when reporting is enabled.
    pub fn new(config: FallbackConfig, reporter: Option<Arc<dyn ErrorReporter>>) -> Self {
        let rewriter = UrlRewriter::from_config(&config);
        let reporter = reporter.filter(|_| config.reporting_enabled);
        Self {
            config: Arc::new(config),
            rewriter,
            reporter,
        }
    }

    /// Forward to the reporting sink, if any.
    pub fn report(&self, error: FallbackError) {
        if let Some(reporter) = &self.reporter {
            reporter.capture_exception(&error);
        }
    }
}

/// How long a continuation waits before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Yield once to the scheduler.
    NextTick,
    After(Duration),
}

impl Delay {
    pub async fn wait(self) {
        match self {
            Delay::NextTick => tokio::task::yield_now().await,
            Delay::After(duration) => tokio::time::sleep(duration).await,
        }
    }
}

/// A step deferred until after the current pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Give a retried image its rewritten `src`.
    AssignSource { node: NodeId, url: String },
    /// Inspect the background of a freshly inserted node.
    ReplaceBackground { node: NodeId },
    /// Walk every element once more for late-resolving backgrounds.
    Rescan,
}

impl Continuation {
    pub fn delay(&self, config: &FallbackConfig) -> Delay {
        match self {
            Continuation::AssignSource { .. } => Delay::NextTick,
            Continuation::ReplaceBackground { .. } => Delay::After(config.settle_delay()),
            Continuation::Rescan => Delay::After(config.rescan_delay()),
        }
    }

    pub fn run(self, doc: &mut Document, ctx: &FallbackContext) {
        match self {
            Continuation::AssignSource { node, url } => resources::assign_source(doc, node, &url),
            Continuation::ReplaceBackground { node } => {
                background::replace_background(doc, ctx, node);
            }
            Continuation::Rescan => {
                let rewritten = background::rescan(doc, ctx);
                tracing::debug!(rewritten, "Background rescan finished");
            }
        }
    }
}
