//! Background-image fallback.
//!
//! Background images never report a load failure, so this engine is
//! driven by the probe (bulk pass, rescan) and by the watcher, never by
//! the load listener.
//!
//! # Per-element Steps
//! ```text
//! inline background-image on delivery domain → rewrite in place, done
//! otherwise:
//!     lift deferred class (if present), read computed value, restore class
//!     for each delivery url(...) in the computed value:
//!         deferred → stash rewritten URL for the reveal collaborator
//!         else     → write rewritten value as inline style
//! ```

use crate::dom::{style, Document, NodeId, Selector};
use crate::engine::{Continuation, FallbackContext};
use crate::error::FallbackError;
use crate::ledger::{self, Concern};
use crate::observability::metrics;

/// Rewrite every delivery-domain `url(...)` in a CSS value.
pub fn rewrite_css_value(ctx: &FallbackContext, value: &str) -> String {
    style::map_urls(value, |url| {
        ctx.rewriter
            .is_delivery_url(url)
            .then(|| ctx.rewriter.rewrite(url))
    })
}

/// Read the computed background of `node` with the deferred class lifted.
/// The class attribute is restored verbatim afterwards.
fn computed_without_deferral(doc: &mut Document, node: NodeId, deferred_class: &str) -> String {
    if !doc.has_class(node, deferred_class) {
        return doc.computed_background_image(node);
    }
    let original = doc.attr(node, "class").map(str::to_string);
    doc.remove_class(node, deferred_class);
    let computed = doc.computed_background_image(node);
    if let Some(class) = original {
        doc.set_attr(node, "class", &class);
    }
    computed
}

/// Apply background fallback to one element. Returns whether anything
/// was rewritten or handed off.
pub fn replace_background(doc: &mut Document, ctx: &FallbackContext, node: NodeId) -> bool {
    if !ctx.config.background_enabled() || ledger::is_marked(doc, node, Concern::BackgroundProcessed) {
        return false;
    }

    if let Some(inline) = doc.style_property(node, "background-image") {
        if ctx.rewriter.is_delivery_url(&inline) {
            let rewritten = rewrite_css_value(ctx, &inline);
            doc.set_style_property(node, "background-image", &rewritten);
            ledger::claim(doc, node, Concern::BackgroundProcessed);
            metrics::record_rewrite("background");
            tracing::debug!(value = %rewritten, "Rewrote inline background image");
            report_rewrites(doc, ctx, node, &delivery_urls(ctx, &inline));
            return true;
        }
    }

    let deferred_class = ctx.config.deferred_class.as_str();
    let deferred = doc.has_class(node, deferred_class);
    let computed = computed_without_deferral(doc, node, deferred_class);

    let urls = delivery_urls(ctx, &computed);
    if urls.is_empty() {
        return false;
    }

    if deferred {
        for url in &urls {
            ledger::store_pending_url(doc, node, &ctx.rewriter.rewrite(url));
        }
        tracing::debug!(urls = urls.len(), "Deferred background fallback until reveal");
    } else {
        let rewritten = rewrite_css_value(ctx, &computed);
        doc.set_style_property(node, "background-image", &rewritten);
        tracing::debug!(value = %rewritten, "Rewrote stylesheet background image");
    }

    ledger::claim(doc, node, Concern::BackgroundProcessed);
    metrics::record_rewrite("background");
    report_rewrites(doc, ctx, node, &urls);
    true
}

fn delivery_urls(ctx: &FallbackContext, value: &str) -> Vec<String> {
    style::extract_urls(value)
        .into_iter()
        .filter(|url| ctx.rewriter.is_delivery_url(url))
        .collect()
}

/// One sink event per rewritten background URL.
fn report_rewrites(doc: &Document, ctx: &FallbackContext, node: NodeId, urls: &[String]) {
    let tag = doc.tag(node).unwrap_or_default();
    for url in urls {
        ctx.report(FallbackError::ResourceFallback {
            tag: tag.to_string(),
            url: url.clone(),
            fallback: ctx.rewriter.rewrite(url),
        });
    }
}

/// Apply background fallback to `root` and its descendants.
pub fn check_subtree(doc: &mut Document, ctx: &FallbackContext, root: NodeId) -> usize {
    let mut nodes = vec![root];
    nodes.extend(doc.descendants(root));
    nodes
        .into_iter()
        .filter(|node| replace_background(doc, ctx, *node))
        .count()
}

/// Walk every element once. Returns how many were rewritten.
pub fn rescan(doc: &mut Document, ctx: &FallbackContext) -> usize {
    doc.elements()
        .into_iter()
        .filter(|node| replace_background(doc, ctx, *node))
        .count()
}

/// Bulk pass: flag deferred elements for the reveal collaborator, rewrite
/// what is resolvable now and queue a rescan for the rest.
pub fn replace_all(doc: &mut Document, ctx: &FallbackContext, queue: &mut Vec<Continuation>) -> usize {
    if !ctx.config.background_enabled() {
        return 0;
    }

    let deferred = Selector::class(&ctx.config.deferred_class);
    for node in doc.query_selector_all(&deferred) {
        if !ledger::is_marked(doc, node, Concern::BackgroundProcessed) {
            ledger::flag_pending(doc, node);
        }
    }

    let count = rescan(doc, ctx);
    queue.push(Continuation::Rescan);
    count
}
