//! Document event subscriptions.
//!
//! Two feeds leave the document: structural insertions under `body` and
//! resource load outcomes. Each subscription is an unbounded,
//! non-restartable stream; dropping it unsubscribes.

use tokio::sync::mpsc;

use crate::dom::node::NodeId;

/// Outcome of a resource load reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadEvent {
    pub node: NodeId,
    pub outcome: LoadOutcome,
}

/// A lazy sequence of document events.
#[derive(Debug)]
pub struct EventStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> EventStream<T> {
    /// Next event, or `None` once the document is gone.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Fan-out list of live subscribers.
#[derive(Debug)]
pub(crate) struct Subscribers<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self { senders: Vec::new() }
    }
}

impl<T: Clone> Subscribers<T> {
    pub(crate) fn subscribe(&mut self) -> EventStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        EventStream { rx }
    }

    /// Deliver to every subscriber, pruning the ones that hung up.
    pub(crate) fn emit(&mut self, event: T) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
