//! Isolated parse and script context for one reframe.
//!
//! A sandbox owns a detached document (with its own `<body>`), its own
//! globals and an apparent `location`. Scripts parsed into it see only these.
//! Once the fragment's nodes have moved into the real container, element
//! lookups are redirected there so scripts holding on to the sandbox keep
//! finding their nodes.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use url::Url;

use crate::piercing::dom::{Dom, NodeId};
use crate::piercing::error::PiercingError;

#[derive(Debug)]
pub struct Sandbox {
    document: NodeId,
    body: NodeId,
    container: NodeId,
    location: Url,
    globals: RefCell<HashMap<String, String>>,
    lookup_root: Cell<NodeId>,
}

impl Sandbox {
    /// Create a sandbox whose content is destined for `container`.
    pub fn create(dom: &mut Dom, container: NodeId, location: Url) -> Result<Self, PiercingError> {
        if !dom.exists(container) {
            return Err(PiercingError::SandboxCreation(format!(
                "container {container:?} does not exist"
            )));
        }
        if !dom.is_element(container) {
            return Err(PiercingError::SandboxCreation(format!(
                "container {container:?} is not an element"
            )));
        }

        let document = dom.create_document();
        let html = dom.create_element("html");
        let body = dom.create_element("body");
        dom.append_child(document, html);
        dom.append_child(html, body);

        Ok(Self {
            document,
            body,
            container,
            location,
            globals: RefCell::new(HashMap::new()),
            lookup_root: Cell::new(body),
        })
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn global(&self, name: &str) -> Option<String> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn set_global(&self, name: &str, value: impl Into<String>) {
        self.globals.borrow_mut().insert(name.to_string(), value.into());
    }

    /// Root searched by [`get_element_by_id`](Self::get_element_by_id).
    pub fn lookup_root(&self) -> NodeId {
        self.lookup_root.get()
    }

    /// Move every parsed node into the container and point lookups at it.
    pub fn transfer(&self, dom: &mut Dom) {
        dom.move_children(self.body, self.container);
        self.lookup_root.set(self.container);
    }

    pub fn get_element_by_id(&self, dom: &Dom, id: &str) -> Option<NodeId> {
        dom.get_element_by_id(self.lookup_root.get(), id)
    }
}
