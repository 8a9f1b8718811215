//! Script execution hooks.
//!
//! # Responsibilities
//! - Classify `<script>` elements by execution timing
//! - Define the pluggable `ScriptRuntime` the tree builder calls into
//! - Expose a sandbox-scoped view of the document to running scripts
//!
//! # Timing
//! - Classic scripts run as soon as their end tag is parsed
//! - After the stream completes: async scripts, then deferred and module
//!   scripts, each group in document order
//! - Inline classic scripts ignore `defer` and `async`
//! - Scripts with a non-JavaScript `type` never run

use thiserror::Error;
use url::Url;

use crate::piercing::dom::{Dom, NodeId};
use crate::piercing::sandbox::Sandbox;

/// When a script runs relative to parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Classic,
    Deferred,
    Module,
    Async,
}

impl ScriptKind {
    /// Classify a script element from its `type`, `src`, `defer` and
    /// `async` attributes. `None` means it is not executable.
    pub fn classify(type_attr: Option<&str>, has_src: bool, defer: bool, is_async: bool) -> Option<Self> {
        let module = match type_attr.map(|t| t.trim().to_ascii_lowercase()) {
            None => false,
            Some(t) if t.is_empty() || is_javascript_mime(&t) => false,
            Some(t) if t == "module" => true,
            Some(_) => return None,
        };

        Some(match (module, has_src, is_async, defer) {
            (true, _, true, _) => ScriptKind::Async,
            (true, _, false, _) => ScriptKind::Module,
            (false, true, true, _) => ScriptKind::Async,
            (false, true, false, true) => ScriptKind::Deferred,
            _ => ScriptKind::Classic,
        })
    }
}

fn is_javascript_mime(mime: &str) -> bool {
    matches!(
        mime,
        "text/javascript"
            | "application/javascript"
            | "application/ecmascript"
            | "text/ecmascript"
            | "application/x-javascript"
    )
}

/// A parsed script ready to run.
#[derive(Debug, Clone)]
pub struct Script {
    pub node: NodeId,
    pub kind: ScriptKind,
    /// Resolved `src`, for external scripts.
    pub src: Option<Url>,
    /// Inline source text.
    pub text: String,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script threw: {0}")]
    Thrown(String),
}

/// Executes scripts on behalf of a sandbox.
///
/// Errors are reported and parsing continues with the next script.
pub trait ScriptRuntime {
    fn execute(&self, script: &Script, scope: &mut ScriptScope<'_>) -> Result<(), ScriptError>;
}

impl<F> ScriptRuntime for F
where
    F: Fn(&Script, &mut ScriptScope<'_>) -> Result<(), ScriptError>,
{
    fn execute(&self, script: &Script, scope: &mut ScriptScope<'_>) -> Result<(), ScriptError> {
        self(script, scope)
    }
}

/// Runtime that ignores every script.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRuntime;

impl ScriptRuntime for NoopRuntime {
    fn execute(&self, _script: &Script, _scope: &mut ScriptScope<'_>) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// What a running script can see: the shared DOM plus its sandbox's
/// globals, location and `document.body`.
pub struct ScriptScope<'a> {
    dom: &'a mut Dom,
    sandbox: &'a Sandbox,
    current_script: NodeId,
}

impl<'a> ScriptScope<'a> {
    pub(crate) fn new(dom: &'a mut Dom, sandbox: &'a Sandbox, current_script: NodeId) -> Self {
        Self {
            dom,
            sandbox,
            current_script,
        }
    }

    pub fn dom(&mut self) -> &mut Dom {
        self.dom
    }

    /// The sandbox document's body.
    pub fn body(&self) -> NodeId {
        self.sandbox.body()
    }

    /// `document.currentScript`.
    pub fn current_script(&self) -> NodeId {
        self.current_script
    }

    /// `document.getElementById`, following the sandbox's lookup redirect.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.sandbox.get_element_by_id(&*self.dom, id)
    }

    /// The sandbox's apparent `location`.
    pub fn location(&self) -> &Url {
        self.sandbox.location()
    }

    pub fn global(&self, name: &str) -> Option<String> {
        self.sandbox.global(name)
    }

    pub fn set_global(&self, name: &str, value: impl Into<String>) {
        self.sandbox.set_global(name, value);
    }
}
