//! Arena-backed document model shared by the host page and its sandboxes.
//!
//! # Design Decisions
//! - Nodes live in one arena and are addressed by `NodeId`; moving a node
//!   between parents keeps its identity, properties and listeners
//! - Removed nodes stay in the arena (detached), like unreferenced DOM nodes
//! - Shared single-threaded as `Rc<RefCell<Dom>>`; borrows are short and
//!   never held across an `.await`

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Elements that never have children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text content is serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Handle to a node in a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

/// Event handler registered on a node.
pub type EventListener = Rc<dyn Fn(NodeId)>;

/// A DOM shared between the page, its sandboxes and running scripts.
pub type SharedDom = Rc<RefCell<Dom>>;

struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: HashMap<String, String>,
    listeners: Vec<(String, EventListener)>,
}

/// Node arena.
#[derive(Default)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dom").field("nodes", &self.nodes.len()).finish()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedDom {
        Rc::new(RefCell::new(self))
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            properties: HashMap::new(),
            listeners: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_document(&mut self) -> NodeId {
        self.alloc(NodeKind::Document)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    /// Whether `node` belongs to this arena.
    pub fn exists(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.exists(node) && matches!(self.kind(node), NodeKind::Element { .. })
    }

    /// Lowercased tag name of an element.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Append `child` as the last child of `parent`, detaching it from its
    /// current parent first. Appending a node into its own subtree is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.contains(child, parent) {
            tracing::warn!(?parent, ?child, "Refusing to append a node into its own subtree");
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Remove `node` from its parent. The node and its subtree stay intact.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    /// Re-parent every child of `from` into `to`, preserving order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.append_child(to, child);
        }
    }

    /// Detach every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes[n.0].parent;
        }
        false
    }

    /// Nearest inclusive ancestor element with the given tag.
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.tag(n) == Some(tag) {
                return Some(n);
            }
            current = self.nodes[n.0].parent;
        }
        None
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            let name = name.to_ascii_lowercase();
            let value = value.into();
            match attributes.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = value,
                None => attributes.push((name, value)),
            }
        }
    }

    /// Script-visible expando property (not reflected as an attribute).
    pub fn property(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, node: NodeId, name: impl Into<String>, value: impl Into<String>) {
        self.nodes[node.0].properties.insert(name.into(), value.into());
    }

    pub fn add_event_listener(&mut self, node: NodeId, event: impl Into<String>, listener: EventListener) {
        self.nodes[node.0].listeners.push((event.into(), listener));
    }

    /// Listeners registered on `node` for `event`, in registration order.
    pub fn listeners(&self, node: NodeId, event: &str) -> Vec<EventListener> {
        self.nodes[node.0]
            .listeners
            .iter()
            .filter(|(e, _)| e == event)
            .map(|(_, l)| l.clone())
            .collect()
    }

    /// Inclusive subtree of `root` in document order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node.0].children.iter().rev());
        }
        out
    }

    /// First element under `root` (inclusive) whose `id` attribute matches.
    pub fn get_element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id))
    }

    /// Elements under `root` (inclusive) with the given tag, in document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.tag(*n) == Some(tag))
            .collect()
    }

    /// Concatenated text of every text node under `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .into_iter()
            .filter_map(|n| match self.kind(n) {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Serialize the children of `node` as HTML.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        let raw = self.tag(node).is_some_and(|t| RAW_TEXT_ELEMENTS.contains(&t));
        for child in self.children(node) {
            self.serialize(*child, raw, &mut out);
        }
        out
    }

    /// Serialize `node` itself as HTML.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.serialize(node, false, &mut out);
        out
    }

    fn serialize(&self, node: NodeId, raw_text: bool, out: &mut String) {
        match self.kind(node) {
            NodeKind::Document => {
                for child in self.children(node) {
                    self.serialize(*child, false, out);
                }
            }
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => escape_into(text, false, out),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                out.push_str(&self.inner_html(node));
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

/// Invoke every `event` listener on `node`. Returns how many ran.
///
/// Listeners are collected before any runs, so they may borrow the DOM.
pub fn dispatch_event(dom: &SharedDom, node: NodeId, event: &str) -> usize {
    let listeners = dom.borrow().listeners(node, event);
    for listener in &listeners {
        listener(node);
    }
    listeners.len()
}
