//! In-memory document model.
//!
//! # Data Flow
//! ```text
//! Host (browser binding, test, CLI)
//!     → builds nodes, sets attributes, adds style rules
//!     → reports resource outcomes (dispatch_load / dispatch_load_error)
//!
//! Document
//!     → insertions under <body> → observe_mutations() subscribers
//!     → load outcomes           → observe_loads() subscribers
//!     → computed_background_image() resolves inline + stylesheet rules
//! ```
//!
//! # Design Decisions
//! - Generational arena: removal frees the node's data (processing marks
//!   included) and returns its slot to a free list; stale ids never resolve
//! - Only insertions under `body` are observable, matching a subtree
//!   observer rooted there
//! - Computed background: important rule > inline > last matching rule

pub mod events;
pub mod node;
pub mod selector;
pub mod style;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::Url;

pub use events::{EventStream, LoadEvent, LoadOutcome};
pub use node::{Element, NodeId, NodeKind};
pub use selector::{Selector, SelectorError};
pub use style::StyleRule;

use crate::ledger::Marks;
use events::Subscribers;
use node::{Node, Slot};

/// Document shared between the host and the fallback engine.
pub type SharedDocument = Arc<Mutex<Document>>;

/// Lock a shared document, recovering from a poisoned lock.
pub fn lock(doc: &SharedDocument) -> MutexGuard<'_, Document> {
    doc.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct Document {
    url: Url,
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    rules: Vec<StyleRule>,
    mutations: Subscribers<NodeId>,
    loads: Subscribers<LoadEvent>,
}

impl Document {
    /// Create an empty `html`/`head`/`body` document served from `url`.
    pub fn new(url: Url) -> Self {
        let mut doc = Self {
            url,
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::new(NodeKind::Document)),
            }],
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            head: NodeId { index: 0, generation: 0 },
            body: NodeId { index: 0, generation: 0 },
            rules: Vec::new(),
            mutations: Subscribers::default(),
            loads: Subscribers::default(),
        };
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.attach(doc.root, html);
        doc.attach(html, head);
        doc.attach(html, body);
        doc.head = head;
        doc.body = body;
        doc
    }

    /// Wrap into a [`SharedDocument`].
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Page origin, e.g. `https://app.example`.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // --- Tree structure ---

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Number of arena slots, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).and_then(Node::element)
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.node_mut(id).and_then(Node::element_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Node::new(NodeKind::Element(Element::new(tag))))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node::new(NodeKind::Text(text.to_string())))
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
    }

    /// Append `child` (moving it if already attached). Insertions landing
    /// under `body` are announced to mutation subscribers.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return;
        }
        if self.is_inclusive_ancestor(child, parent) {
            return;
        }
        self.detach(child);
        self.attach(parent, child);

        if self.is_inclusive_ancestor(self.body, parent) {
            self.mutations.emit(child);
        }
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attr(id, name, value);
        }
        self.append_child(parent, id);
        id
    }

    /// Detach `id` and free its whole subtree.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root || !self.contains(id) {
            return;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !self.contains(next) {
                continue;
            }
            let slot = &mut self.slots[next.index];
            let node = slot.node.take();
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(next.index);
            if let Some(node) = node {
                stack.extend(node.children);
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// True when `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Descendant elements of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.element(next).is_some() {
                out.push(next);
            }
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// All connected elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root)
    }

    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|id| self.element(*id).is_some_and(|el| selector.matches(el)))
            .collect()
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    // --- Attributes ---

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.remove(&name.to_ascii_lowercase());
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) || self.element(id).is_none() {
            return;
        }
        let mut classes: Vec<String> = self
            .element(id)
            .map(|el| el.classes().map(str::to_string).collect())
            .unwrap_or_default();
        classes.push(class.to_string());
        self.set_attr(id, "class", &classes.join(" "));
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let classes: Vec<String> = self
            .element(id)
            .map(|el| el.classes().filter(|c| *c != class).map(str::to_string).collect())
            .unwrap_or_default();
        self.set_attr(id, "class", &classes.join(" "));
    }

    // --- Processing marks ---

    pub fn marks(&self, id: NodeId) -> Option<&Marks> {
        self.element(id).map(|el| &el.marks)
    }

    pub fn marks_mut(&mut self, id: NodeId) -> Option<&mut Marks> {
        self.element_mut(id).map(|el| &mut el.marks)
    }

    // --- Style ---

    /// Inline value of `property`, if declared.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        style::parse_declarations(style)
            .into_iter()
            .rev()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set an inline declaration, replacing an existing one in place.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut decls = self
            .attr(id, "style")
            .map(style::parse_declarations)
            .unwrap_or_default();
        let mut replaced = false;
        decls.retain_mut(|(name, current)| {
            if name != property {
                return true;
            }
            if replaced {
                return false;
            }
            *current = value.to_string();
            replaced = true;
            true
        });
        if !replaced {
            decls.push((property.to_string(), value.to_string()));
        }
        self.set_attr(id, "style", &style::serialize_declarations(&decls));
    }

    pub fn add_style_rule(&mut self, rule: StyleRule) {
        self.rules.push(rule);
    }

    /// Resolved `background-image` for `id`, `none` when nothing applies.
    pub fn computed_background_image(&self, id: NodeId) -> String {
        let Some(el) = self.element(id) else {
            return "none".to_string();
        };

        let matching: Vec<&StyleRule> = self.rules.iter().filter(|r| r.selector.matches(el)).collect();

        if let Some(rule) = matching.iter().rev().find(|r| r.important) {
            return rule.background_image.clone();
        }
        if let Some(inline) = self.style_property(id, "background-image") {
            return inline;
        }
        matching
            .last()
            .map(|r| r.background_image.clone())
            .unwrap_or_else(|| "none".to_string())
    }

    // --- Events ---

    pub fn observe_mutations(&mut self) -> EventStream<NodeId> {
        self.mutations.subscribe()
    }

    pub fn observe_loads(&mut self) -> EventStream<LoadEvent> {
        self.loads.subscribe()
    }

    /// Report that the resource referenced by `id` loaded.
    pub fn dispatch_load(&mut self, id: NodeId) {
        self.loads.emit(LoadEvent {
            node: id,
            outcome: LoadOutcome::Loaded,
        });
    }

    /// Report that the resource referenced by `id` failed to load.
    pub fn dispatch_load_error(&mut self, id: NodeId) {
        self.loads.emit(LoadEvent {
            node: id,
            outcome: LoadOutcome::Failed,
        });
    }
}
