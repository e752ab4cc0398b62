//! Dynamic content handling.
//!
//! # Responsibilities
//! - Apply image/source fallback to nodes inserted after the bulk pass
//! - Propagate the deferred-reveal flag to inserted deferred elements
//! - Queue background checks for the inserted subtree after a settle delay
//!
//! # Design Decisions
//! - Only runs while the probe result is `Unavailable`; the caller gates
//!   on that. Insertions seen earlier are dropped, not replayed later

use crate::dom::{Document, NodeId};
use crate::engine::{resources, Continuation, FallbackContext};
use crate::ledger::{self, Concern};

fn apply_resource_strategy(
    doc: &mut Document,
    ctx: &FallbackContext,
    node: NodeId,
    queue: &mut Vec<Continuation>,
) -> bool {
    match doc.tag(node) {
        Some("img") => resources::retry_image(doc, ctx, node, queue),
        Some("source") => resources::rewrite_source(doc, ctx, node),
        _ => false,
    }
}

/// Process one inserted subtree root. Returns how many resources were
/// rewritten synchronously.
pub fn process_inserted(
    doc: &mut Document,
    ctx: &FallbackContext,
    node: NodeId,
    queue: &mut Vec<Continuation>,
) -> usize {
    if doc.element(node).is_none() {
        return 0;
    }

    let background = ctx.config.background_enabled();
    let mut subtree = vec![node];
    subtree.extend(doc.descendants(node));

    let mut rewritten = 0;
    for &el in &subtree {
        if apply_resource_strategy(doc, ctx, el, queue) {
            rewritten += 1;
        }
        if background
            && doc.has_class(el, &ctx.config.deferred_class)
            && !ledger::is_marked(doc, el, Concern::BackgroundProcessed)
        {
            ledger::flag_pending(doc, el);
        }
    }

    if background {
        queue.extend(subtree.into_iter().map(|el| Continuation::ReplaceBackground { node: el }));
    }

    tracing::debug!(rewritten, "Processed inserted content");
    rewritten
}
