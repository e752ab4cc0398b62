//! Document-wide load failure handling.
//!
//! Load failures do not bubble, so the listener subscribes to every load
//! outcome in the document rather than to individual elements.

use crate::dom::{Document, LoadEvent, LoadOutcome};
use crate::engine::{resources, Continuation, FallbackContext};

const HANDLED_TAGS: [&str; 3] = ["script", "link", "img"];

/// Route one load outcome. One-shot retry handlers see the event first;
/// everything else must be a delivery-domain script, stylesheet or image.
pub fn on_load_event(
    doc: &mut Document,
    ctx: &FallbackContext,
    event: LoadEvent,
    queue: &mut Vec<Continuation>,
) {
    let node = event.node;
    let armed = doc.marks_mut(node).is_some_and(|m| m.take_retry());

    match event.outcome {
        LoadOutcome::Loaded => {
            if armed {
                tracing::debug!("Fallback resource loaded");
            }
        }
        LoadOutcome::Failed if armed => {
            resources::handle_resource_error(doc, ctx, node, queue);
        }
        LoadOutcome::Failed => {
            let Some(url) = resources::source_url(doc, node) else {
                return;
            };
            if !ctx.rewriter.is_delivery_url(&url) {
                return;
            }
            if !doc.tag(node).is_some_and(|tag| HANDLED_TAGS.contains(&tag)) {
                return;
            }
            resources::handle_resource_error(doc, ctx, node, queue);
        }
    }
}
