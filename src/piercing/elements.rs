//! Piercing elements and their lifecycle.
//!
//! # Lifecycle
//! ```text
//! Outlet attach
//!   → set correlation cookie
//!   → server-rendered host with content already inside  → Pierced (no fetch)
//!   → Announced: offer OutletReady to pre-rendered hosts (document order)
//!       claimed   → host moves into the outlet          → Pierced (no fetch)
//!       unclaimed → synthesize host, Reframing → fetch   → Mounted
//! Outlet detach
//!   → expire cookie → outlet and owned hosts Unmounted → subtree removed
//! ```
//!
//! # Design Decisions
//! - A synchronous two-phase claim replaces the readiness event: the first
//!   host to claim wins, later claims are refused
//! - A pre-rendered host is one outside any outlet; hosts already inside an
//!   outlet belong to it

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

use crate::gateway::classify::FRAGMENT_PATH_PREFIX;
use crate::html::{FRAGMENT_ID_ATTRIBUTE, HOST_TAG, OUTLET_TAG};
use crate::piercing::cookies::{CookieJar, CORRELATION_COOKIE};
use crate::piercing::dom::{Dom, NodeId, SharedDom};
use crate::piercing::error::PiercingError;
use crate::piercing::fetch::Fetcher;
use crate::piercing::parser::TreeBuilder;
use crate::piercing::reframe::{reframe, FragmentSource};
use crate::piercing::script::ScriptRuntime;

/// Attribute overriding the URL an outlet or host loads its fragment from.
pub const FRAGMENT_SRC_ATTRIBUTE: &str = "fragment-src";

/// Lifecycle state of a piercing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiercingState {
    Announced,
    Pierced,
    Reframing,
    Mounted,
    Unmounted,
}

/// The host document the piercing elements live in.
pub struct Page {
    dom: SharedDom,
    document: NodeId,
    body: NodeId,
    location: Url,
    cookies: Rc<RefCell<CookieJar>>,
    fetcher: Rc<dyn Fetcher>,
    runtime: Rc<dyn ScriptRuntime>,
    states: RefCell<HashMap<NodeId, PiercingState>>,
}

impl Page {
    /// Empty page at `location`.
    pub fn new(location: Url, fetcher: Rc<dyn Fetcher>, runtime: Rc<dyn ScriptRuntime>) -> Self {
        let mut dom = Dom::new();
        let document = dom.create_document();
        let html = dom.create_element("html");
        let body = dom.create_element("body");
        dom.append_child(document, html);
        dom.append_child(html, body);

        Self {
            dom: dom.shared(),
            document,
            body,
            location,
            cookies: Rc::new(RefCell::new(CookieJar::new())),
            fetcher,
            runtime,
            states: RefCell::new(HashMap::new()),
        }
    }

    /// Page whose body holds the server-rendered `markup`. Scripts in the
    /// markup are not executed; the server already ran the shell.
    pub fn from_markup(
        location: Url,
        markup: &str,
        fetcher: Rc<dyn Fetcher>,
        runtime: Rc<dyn ScriptRuntime>,
    ) -> Self {
        let page = Self::new(location, fetcher, runtime);
        {
            let mut dom = page.dom.borrow_mut();
            let mut builder = TreeBuilder::inert(page.body, page.location.clone());
            builder.feed(&mut dom, None, markup);
            builder.finish(&mut dom, None);
        }
        page
    }

    pub fn dom(&self) -> &SharedDom {
        &self.dom
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn cookies(&self) -> &RefCell<CookieJar> {
        &self.cookies
    }

    /// Live value of a cookie.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.borrow().get(name).map(str::to_string)
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn runtime(&self) -> Rc<dyn ScriptRuntime> {
        self.runtime.clone()
    }

    /// Lifecycle state of a piercing element.
    pub fn state(&self, element: NodeId) -> Option<PiercingState> {
        self.states.borrow().get(&element).copied()
    }

    fn set_state(&self, element: NodeId, state: PiercingState) {
        tracing::trace!(?element, ?state, "Piercing state changed");
        self.states.borrow_mut().insert(element, state);
    }

    /// Pre-rendered hosts for `fragment_id` (outside every outlet), in
    /// document order.
    fn pre_rendered_hosts(&self, fragment_id: &str) -> Vec<NodeId> {
        let dom = self.dom.borrow();
        dom.elements_by_tag(self.document, HOST_TAG)
            .into_iter()
            .filter(|host| dom.attribute(*host, FRAGMENT_ID_ATTRIBUTE) == Some(fragment_id))
            .filter(|host| {
                dom.parent(*host)
                    .map_or(true, |parent| dom.closest(parent, OUTLET_TAG).is_none())
            })
            .collect()
    }

    /// Default fragment URL: the reserved gateway path for `fragment_id`
    /// followed by the page's own path and query.
    pub fn fragment_url(&self, fragment_id: &str) -> Result<Url, PiercingError> {
        let mut url = self.location.join(&format!(
            "{FRAGMENT_PATH_PREFIX}{fragment_id}{}",
            self.location.path()
        ))?;
        url.set_query(self.location.query());
        Ok(url)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("location", &self.location.as_str())
            .field("dom", &self.dom)
            .finish()
    }
}

/// Readiness announcement made by an attaching outlet.
#[derive(Debug)]
pub struct OutletReady {
    fragment_id: String,
    outlet: NodeId,
    claimed_by: Cell<Option<NodeId>>,
}

impl OutletReady {
    pub fn new(fragment_id: impl Into<String>, outlet: NodeId) -> Self {
        Self {
            fragment_id: fragment_id.into(),
            outlet,
            claimed_by: Cell::new(None),
        }
    }

    pub fn fragment_id(&self) -> &str {
        &self.fragment_id
    }

    pub fn outlet(&self) -> NodeId {
        self.outlet
    }

    /// Claim the outlet for `host`. Only the first claim succeeds.
    pub fn claim(&self, host: NodeId) -> bool {
        if self.claimed_by.get().is_some() {
            return false;
        }
        self.claimed_by.set(Some(host));
        true
    }

    pub fn claimed_by(&self) -> Option<NodeId> {
        self.claimed_by.get()
    }
}

fn fragment_id_of(dom: &Dom, node: NodeId, tag: &str) -> Result<String, PiercingError> {
    dom.attribute(node, FRAGMENT_ID_ATTRIBUTE)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PiercingError::MissingFragmentId {
            tag: tag.to_string(),
        })
}

/// `<piercing-fragment-outlet>`: the place in the shell a fragment belongs.
#[derive(Debug, Clone)]
pub struct FragmentOutlet {
    node: NodeId,
    fragment_id: String,
}

impl FragmentOutlet {
    /// Wrap an outlet element, validating its `fragment-id`.
    pub fn from_node(page: &Page, node: NodeId) -> Result<Self, PiercingError> {
        let fragment_id = fragment_id_of(&page.dom.borrow(), node, OUTLET_TAG)?;
        Ok(Self { node, fragment_id })
    }

    /// Every outlet element in the page, in document order.
    pub fn all(page: &Page) -> Vec<NodeId> {
        page.dom.borrow().elements_by_tag(page.document, OUTLET_TAG)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn fragment_id(&self) -> &str {
        &self.fragment_id
    }

    /// Host for this fragment rendered inside the outlet by the server.
    fn server_rendered_host(&self, page: &Page) -> Option<NodeId> {
        let dom = page.dom.borrow();
        dom.elements_by_tag(self.node, HOST_TAG)
            .into_iter()
            .find(|host| {
                dom.attribute(*host, FRAGMENT_ID_ATTRIBUTE) == Some(self.fragment_id.as_str())
                    && !dom.children(*host).is_empty()
            })
    }

    /// Connect the outlet: pierce a pre-rendered host into it or, failing
    /// that, mount a freshly fetched fragment.
    pub async fn attach(&self, page: &Page) -> Result<PiercingState, PiercingError> {
        page.cookies
            .borrow_mut()
            .set(CORRELATION_COOKIE, &self.fragment_id, "/");

        if let Some(host) = self.server_rendered_host(page) {
            page.set_state(host, PiercingState::Pierced);
            page.set_state(self.node, PiercingState::Pierced);
            tracing::debug!(fragment_id = %self.fragment_id, "Fragment already rendered in outlet");
            return Ok(PiercingState::Pierced);
        }
        page.set_state(self.node, PiercingState::Announced);

        let ready = OutletReady::new(self.fragment_id.clone(), self.node);
        for host in page.pre_rendered_hosts(&self.fragment_id) {
            FragmentHost {
                node: host,
                fragment_id: self.fragment_id.clone(),
            }
            .on_outlet_ready(page, &ready);
        }

        if ready.claimed_by().is_some() {
            page.set_state(self.node, PiercingState::Pierced);
            tracing::debug!(fragment_id = %self.fragment_id, "Fragment pierced");
            return Ok(PiercingState::Pierced);
        }

        let host = {
            let mut dom = page.dom.borrow_mut();
            let host = dom.create_element(HOST_TAG);
            dom.set_attribute(host, FRAGMENT_ID_ATTRIBUTE, self.fragment_id.clone());
            dom.append_child(self.node, host);
            host
        };
        let state = FragmentHost {
            node: host,
            fragment_id: self.fragment_id.clone(),
        }
        .attach(page)
        .await?;
        page.set_state(self.node, state);
        Ok(state)
    }

    /// Disconnect the outlet: expire its cookie, unmount it with the hosts
    /// it owns and drop its content.
    pub fn detach(&self, page: &Page) {
        {
            let mut cookies = page.cookies.borrow_mut();
            if cookies.get(CORRELATION_COOKIE) == Some(self.fragment_id.as_str()) {
                cookies.expire(CORRELATION_COOKIE, "/");
            }
        }

        let mut dom = page.dom.borrow_mut();
        for host in dom.elements_by_tag(self.node, HOST_TAG) {
            page.set_state(host, PiercingState::Unmounted);
        }
        page.set_state(self.node, PiercingState::Unmounted);
        dom.clear_children(self.node);
        dom.detach(self.node);
        tracing::debug!(fragment_id = %self.fragment_id, "Outlet detached");
    }
}

/// `<piercing-fragment-host>`: owns a fragment's markup.
#[derive(Debug, Clone)]
pub struct FragmentHost {
    node: NodeId,
    fragment_id: String,
}

impl FragmentHost {
    /// Wrap a host element, validating its `fragment-id`.
    pub fn from_node(page: &Page, node: NodeId) -> Result<Self, PiercingError> {
        let fragment_id = fragment_id_of(&page.dom.borrow(), node, HOST_TAG)?;
        Ok(Self { node, fragment_id })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn fragment_id(&self) -> &str {
        &self.fragment_id
    }

    /// Connect the host.
    ///
    /// A pre-rendered host (outside any outlet) waits to be claimed. A host
    /// inside an outlet with content is already pierced. An empty host
    /// inside an outlet reframes its fragment.
    pub async fn attach(&self, page: &Page) -> Result<PiercingState, PiercingError> {
        let (outlet, has_content, src) = {
            let dom = page.dom.borrow();
            let outlet = dom
                .parent(self.node)
                .and_then(|parent| dom.closest(parent, OUTLET_TAG));
            let src = dom
                .attribute(self.node, FRAGMENT_SRC_ATTRIBUTE)
                .or_else(|| outlet.and_then(|o| dom.attribute(o, FRAGMENT_SRC_ATTRIBUTE)))
                .map(str::to_string);
            (outlet, !dom.children(self.node).is_empty(), src)
        };

        match (outlet, has_content) {
            (None, _) => {
                page.set_state(self.node, PiercingState::Announced);
                Ok(PiercingState::Announced)
            }
            (Some(_), true) => {
                page.set_state(self.node, PiercingState::Pierced);
                Ok(PiercingState::Pierced)
            }
            (Some(_), false) => {
                let url = match src {
                    Some(src) => page.location.join(&src)?,
                    None => page.fragment_url(&self.fragment_id)?,
                };
                page.set_state(self.node, PiercingState::Reframing);
                tracing::debug!(fragment_id = %self.fragment_id, url = %url, "Reframing fragment");

                match reframe(page, FragmentSource::Url(url), self.node).await {
                    Ok(_) => {
                        page.set_state(self.node, PiercingState::Mounted);
                        Ok(PiercingState::Mounted)
                    }
                    Err(e) => {
                        page.states.borrow_mut().remove(&self.node);
                        Err(e)
                    }
                }
            }
        }
    }

    /// React to an outlet announcing readiness: claim it and move into it.
    /// Returns whether this host won the claim.
    pub fn on_outlet_ready(&self, page: &Page, ready: &OutletReady) -> bool {
        if ready.fragment_id() != self.fragment_id || !ready.claim(self.node) {
            return false;
        }
        page.dom.borrow_mut().append_child(ready.outlet(), self.node);
        page.set_state(self.node, PiercingState::Pierced);
        true
    }
}

/// Attach every outlet in the page, in document order.
pub async fn attach_outlets(page: &Page) -> Vec<Result<PiercingState, PiercingError>> {
    let mut results = Vec::new();
    for node in FragmentOutlet::all(page) {
        let result = match FragmentOutlet::from_node(page, node) {
            Ok(outlet) => outlet.attach(page).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Outlet failed to attach");
        }
        results.push(result);
    }
    results
}
