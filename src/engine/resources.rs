//! Tag-specific resource fallback.
//!
//! # Responsibilities
//! - Redirect a failed `<script>`, `<link>` or `<img>` to the fallback origin
//! - Detect the fallback origin failing too and degrade (hide images)
//! - Bulk-rewrite every delivery-domain `<img>` / `<source>` when the
//!   probe says the domain is down
//!
//! # Strategies
//! ```text
//! script → new <script src=fallback> in <head>, async/defer/type copied,
//!          failed element left in place
//! link   → new <link rel=stylesheet href=fallback> in <head>, media copied
//! img    → <picture> <source srcset> siblings rewritten, own srcset
//!          rewritten, src removed now, reassigned next tick, one-shot
//!          retry handler armed
//! ```

use crate::dom::{Document, NodeId, Selector};
use crate::engine::{background, Continuation, FallbackContext};
use crate::error::FallbackError;
use crate::ledger::{self, Concern};
use crate::observability::metrics;

/// The attribute that carries a resource URL for `tag`.
pub fn source_attr(tag: &str) -> Option<&'static str> {
    match tag {
        "script" | "img" => Some("src"),
        "link" => Some("href"),
        "source" => Some("srcset"),
        _ => None,
    }
}

/// Current resource URL of `node`, if it has one.
pub fn source_url(doc: &Document, node: NodeId) -> Option<String> {
    let attr = source_attr(doc.tag(node)?)?;
    doc.attr(node, attr).map(str::to_string)
}

/// React to a load failure on `node`.
pub fn handle_resource_error(
    doc: &mut Document,
    ctx: &FallbackContext,
    node: NodeId,
    queue: &mut Vec<Continuation>,
) {
    let Some(tag) = doc.tag(node).map(str::to_string) else {
        return;
    };

    if ledger::is_marked(doc, node, Concern::ErrorFailed) {
        tracing::trace!(tag = %tag, "Ignoring failure of already failed element");
        return;
    }

    if ledger::is_marked(doc, node, Concern::ErrorHandled) {
        ledger::claim(doc, node, Concern::ErrorFailed);
        let url = source_url(doc, node).unwrap_or_default();
        if tag == "img" {
            doc.set_style_property(node, "display", "none");
        }
        tracing::warn!(tag = %tag, url = %url, "Fallback resource failed to load");
        metrics::record_failed(&tag);
        ctx.report(FallbackError::FallbackFailed { tag, url });
        return;
    }

    let Some(url) = source_url(doc, node) else {
        return;
    };
    if !ctx.rewriter.is_delivery_url(&url) {
        return;
    }

    ledger::claim(doc, node, Concern::ErrorHandled);
    let fallback = ctx.rewriter.rewrite(&url);

    tracing::info!(tag = %tag, url = %url, fallback = %fallback, "CDN resource failed, loading from fallback");
    ctx.report(FallbackError::ResourceFallback {
        tag: tag.clone(),
        url,
        fallback: fallback.clone(),
    });

    match tag.as_str() {
        "script" => replace_script(doc, node, &fallback),
        "link" => replace_stylesheet(doc, node, &fallback),
        "img" => replace_image(doc, ctx, node, &fallback, queue),
        _ => {}
    }
}

fn replace_script(doc: &mut Document, failed: NodeId, fallback: &str) {
    let script = doc.create_element("script");
    doc.set_attr(script, "src", fallback);
    for attr in ["async", "defer", "type"] {
        if let Some(value) = doc.attr(failed, attr).map(str::to_string) {
            doc.set_attr(script, attr, &value);
        }
    }
    let head = doc.head();
    doc.append_child(head, script);
    metrics::record_rewrite("script");
}

fn replace_stylesheet(doc: &mut Document, failed: NodeId, fallback: &str) {
    let link = doc.create_element("link");
    doc.set_attr(link, "rel", "stylesheet");
    doc.set_attr(link, "href", fallback);
    if let Some(media) = doc.attr(failed, "media").map(str::to_string) {
        doc.set_attr(link, "media", &media);
    }
    let head = doc.head();
    doc.append_child(head, link);
    metrics::record_rewrite("stylesheet");
}

fn replace_image(
    doc: &mut Document,
    ctx: &FallbackContext,
    img: NodeId,
    fallback: &str,
    queue: &mut Vec<Continuation>,
) {
    if let Some(picture) = doc.parent(img).filter(|p| doc.tag(*p) == Some("picture")) {
        let sources: Vec<NodeId> = doc
            .children(picture)
            .iter()
            .copied()
            .filter(|c| doc.tag(*c) == Some("source"))
            .collect();
        for source in sources {
            rewrite_source(doc, ctx, source);
        }
    }

    if let Some(srcset) = doc.attr(img, "srcset").map(str::to_string) {
        if ctx.rewriter.is_delivery_url(&srcset) {
            doc.set_attr(img, "srcset", &ctx.rewriter.rewrite(&srcset));
        }
    }

    // Dropping src first makes the host forget the cached failure.
    doc.remove_attr(img, "src");
    queue.push(Continuation::AssignSource {
        node: img,
        url: fallback.to_string(),
    });
    metrics::record_rewrite("image");
}

/// Reassign a retried image's `src` and arm its one-shot retry handler.
pub fn assign_source(doc: &mut Document, img: NodeId, url: &str) {
    if !doc.contains(img) {
        return;
    }
    doc.set_attr(img, "src", url);
    if let Some(marks) = doc.marks_mut(img) {
        marks.arm_retry();
    }
}

/// Rewrite a `<source srcset>` once. Returns whether it changed.
pub fn rewrite_source(doc: &mut Document, ctx: &FallbackContext, source: NodeId) -> bool {
    let Some(srcset) = doc.attr(source, "srcset").map(str::to_string) else {
        return false;
    };
    if !ctx.rewriter.is_delivery_url(&srcset) || !ledger::claim(doc, source, Concern::ErrorHandled) {
        return false;
    }
    let fallback = ctx.rewriter.rewrite(&srcset);
    doc.set_attr(source, "srcset", &fallback);
    metrics::record_rewrite("source");
    ctx.report(FallbackError::ResourceFallback {
        tag: "source".to_string(),
        url: srcset,
        fallback,
    });
    true
}

/// Retry a delivery-domain `<img>` from the fallback origin once.
/// Returns whether a retry was queued.
pub fn retry_image(
    doc: &mut Document,
    ctx: &FallbackContext,
    img: NodeId,
    queue: &mut Vec<Continuation>,
) -> bool {
    let Some(src) = doc.attr(img, "src").map(str::to_string) else {
        return false;
    };
    if !ctx.rewriter.is_delivery_url(&src) || !ledger::claim(doc, img, Concern::ErrorHandled) {
        return false;
    }
    let fallback = ctx.rewriter.rewrite(&src);
    replace_image(doc, ctx, img, &fallback, queue);
    ctx.report(FallbackError::ResourceFallback {
        tag: "img".to_string(),
        url: src,
        fallback,
    });
    true
}

/// Bulk pass run when the delivery domain is unreachable.
/// Returns the number of resources rewritten or queued.
pub fn replace_all(doc: &mut Document, ctx: &FallbackContext, queue: &mut Vec<Continuation>) -> usize {
    let mut count = 0;

    if let Ok(selector) = Selector::parse("source[srcset]") {
        for source in doc.query_selector_all(&selector) {
            if rewrite_source(doc, ctx, source) {
                count += 1;
            }
        }
    }

    if let Ok(selector) = Selector::parse("img[src]") {
        for img in doc.query_selector_all(&selector) {
            if retry_image(doc, ctx, img, queue) {
                count += 1;
            }
        }
    }

    if ctx.config.background_enabled() {
        count += background::replace_all(doc, ctx, queue);
    }

    tracing::info!(rewritten = count, "Replaced CDN resources with fallback origin");
    count
}
