//! Element processing ledger.
//!
//! # Responsibilities
//! - Track, per element and per concern, whether fallback already ran
//! - Carry the one-shot retry handler state of a retried image
//! - Name the attributes shared with the deferred-reveal collaborator
//!
//! # State Transitions
//! ```text
//! (none) → ErrorHandled → ErrorFailed   (terminal)
//! (none) → BackgroundProcessed
//! ```
//!
//! # Design Decisions
//! - Marks live inside the element and die with it; there is no registry
//! - Marks are monotonic: nothing ever clears a concern once set

use crate::dom::{Document, NodeId};

/// Attribute holding a rewritten background URL for a deferred element.
/// The reveal collaborator applies it as an inline style and removes it.
pub const PENDING_URL_ATTR: &str = "data-fallback-bg";

/// Attribute asking the reveal collaborator to call back into
/// `replace_background` when it lifts the suppression.
pub const PENDING_FLAG_ATTR: &str = "data-fallback-pending";

/// What a mark is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concern {
    /// The element's load error was redirected to the fallback origin.
    ErrorHandled,
    /// The fallback origin failed too.
    ErrorFailed,
    /// The element's background image was inspected and rewritten.
    BackgroundProcessed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marks {
    error_handled: bool,
    error_failed: bool,
    background_processed: bool,
    retry_armed: bool,
}

impl Marks {
    pub fn is_set(&self, concern: Concern) -> bool {
        match concern {
            Concern::ErrorHandled => self.error_handled,
            Concern::ErrorFailed => self.error_failed,
            Concern::BackgroundProcessed => self.background_processed,
        }
    }

    /// Set `concern`. Returns `false` when it was already set.
    pub fn set(&mut self, concern: Concern) -> bool {
        if self.is_set(concern) {
            return false;
        }
        match concern {
            Concern::ErrorHandled => self.error_handled = true,
            Concern::ErrorFailed => {
                self.error_handled = true;
                self.error_failed = true;
            }
            Concern::BackgroundProcessed => self.background_processed = true,
        }
        true
    }

    /// Attach the one-shot outcome handler of a retried image.
    pub fn arm_retry(&mut self) {
        self.retry_armed = true;
    }

    /// Consume the one-shot handler, returning whether it was attached.
    pub fn take_retry(&mut self) -> bool {
        std::mem::take(&mut self.retry_armed)
    }

    pub fn retry_armed(&self) -> bool {
        self.retry_armed
    }
}

/// Whether `node` already carries `concern`. Missing nodes count as marked
/// so stale ids are never processed.
pub fn is_marked(doc: &Document, node: NodeId, concern: Concern) -> bool {
    doc.marks(node).map_or(true, |m| m.is_set(concern))
}

/// Claim `concern` on `node`. Returns `true` only for the first claim.
pub fn claim(doc: &mut Document, node: NodeId, concern: Concern) -> bool {
    doc.marks_mut(node).is_some_and(|m| m.set(concern))
}

/// Tell the reveal collaborator to consult the engine when it reveals `node`.
pub fn flag_pending(doc: &mut Document, node: NodeId) {
    doc.set_attr(node, PENDING_FLAG_ATTR, "true");
}

/// Hand a rewritten background URL to the reveal collaborator.
pub fn store_pending_url(doc: &mut Document, node: NodeId, url: &str) {
    doc.set_attr(node, PENDING_URL_ATTR, url);
}
