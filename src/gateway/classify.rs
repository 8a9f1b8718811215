//! Per-request classification.
//!
//! # Rules (first applicable wins)
//! 1. `/piercing-fragment/<id>/<rest>` with a registered `<id>` → fragment
//!    proxy for `/<rest>`; an unknown `<id>` → not found
//! 2. A path matched by a fragment's route patterns → fragment proxy
//! 3. `GET`/`HEAD` → shell passthrough (document navigation, rewritten)
//! 4. Anything else → not found (passed to the shell untouched)

use axum::http::Method;

use crate::routing::FragmentRegistry;

/// Path prefix reserved for out-of-band fragment fetches issued by the
/// reframing engine.
pub const FRAGMENT_PATH_PREFIX: &str = "/piercing-fragment/";

/// Routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    ShellPassthrough,
    FragmentProxy {
        fragment_id: String,
        /// Path to request from the fragment origin.
        path: String,
    },
    NotFound,
}

impl Classification {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::ShellPassthrough => "shell",
            Classification::FragmentProxy { .. } => "fragment",
            Classification::NotFound => "not_found",
        }
    }
}

/// Classify a request by method and path.
pub fn classify(registry: &FragmentRegistry, method: &Method, path: &str) -> Classification {
    if let Some(rest) = path.strip_prefix(FRAGMENT_PATH_PREFIX) {
        let (fragment_id, tail) = match rest.split_once('/') {
            Some((id, tail)) => (id, format!("/{tail}")),
            None => (rest, "/".to_string()),
        };
        return match registry.get(fragment_id) {
            Some(fragment) => Classification::FragmentProxy {
                fragment_id: fragment.fragment_id.clone(),
                path: tail,
            },
            None => Classification::NotFound,
        };
    }

    if let Some(matched) = registry.match_path(path) {
        return Classification::FragmentProxy {
            fragment_id: matched.fragment_id.to_string(),
            path: path.to_string(),
        };
    }

    if method == Method::GET || method == Method::HEAD {
        Classification::ShellPassthrough
    } else {
        Classification::NotFound
    }
}
