//! Fragment registry.
//!
//! # Responsibilities
//! - Store fragment configurations in registration order
//! - Answer "which fragment, if any, owns this path?"
//!
//! # Design Decisions
//! - Immutable after startup (thread-safe without locks once shared in an `Arc`)
//! - First registered match wins; registration order is routing priority
//! - O(n) pattern scan (acceptable for typical fragment counts)
//! - Explicit `None` rather than a silent default fragment

use axum::http::HeaderName;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::config::validation::ValidationError;
use crate::config::ConfigError;
use crate::gateway::fallback::SsrFallback;
use crate::routing::matcher::RoutePattern;

/// Configuration of one fragment. Immutable once registered.
#[derive(Clone)]
pub struct FragmentConfig {
    /// Unique key of the fragment.
    pub fragment_id: String,
    /// Path patterns owned by this fragment, in priority order.
    pub route_patterns: Vec<RoutePattern>,
    /// Base URL of the fragment origin.
    pub endpoint: Url,
    /// Classes added to pre-rendered host elements in the shell document.
    pub pre_piercing_class_names: Vec<String>,
    /// Request headers copied from the shell request onto fragment fetches.
    pub forward_fragment_headers: Vec<HeaderName>,
    /// Produces a substitute response when the fragment origin fails.
    pub on_ssr_fetch_error: Option<Arc<dyn SsrFallback>>,
}

impl FragmentConfig {
    pub fn builder(fragment_id: impl Into<String>, endpoint: Url) -> FragmentConfigBuilder {
        FragmentConfigBuilder {
            fragment_id: fragment_id.into(),
            endpoint,
            routes: Vec::new(),
            class_names: Vec::new(),
            headers: Vec::new(),
            fallback: None,
        }
    }
}

impl fmt::Debug for FragmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentConfig")
            .field("fragment_id", &self.fragment_id)
            .field("route_patterns", &self.route_patterns)
            .field("endpoint", &self.endpoint.as_str())
            .field("pre_piercing_class_names", &self.pre_piercing_class_names)
            .field("forward_fragment_headers", &self.forward_fragment_headers)
            .field("on_ssr_fetch_error", &self.on_ssr_fetch_error.is_some())
            .finish()
    }
}

/// Builder collecting raw strings; everything is validated in [`build`](Self::build).
pub struct FragmentConfigBuilder {
    fragment_id: String,
    endpoint: Url,
    routes: Vec<String>,
    class_names: Vec<String>,
    headers: Vec<String>,
    fallback: Option<Arc<dyn SsrFallback>>,
}

impl FragmentConfigBuilder {
    pub fn route(mut self, pattern: impl Into<String>) -> Self {
        self.routes.push(pattern.into());
        self
    }

    pub fn pre_piercing_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_names.push(class_name.into());
        self
    }

    pub fn forward_header(mut self, name: impl Into<String>) -> Self {
        self.headers.push(name.into());
        self
    }

    pub fn on_ssr_fetch_error(mut self, fallback: impl SsrFallback + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn on_ssr_fetch_error_arc(mut self, fallback: Arc<dyn SsrFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Compile patterns and header names.
    pub fn build(self) -> Result<FragmentConfig, ConfigError> {
        let id = self.fragment_id;

        let route_patterns = self
            .routes
            .iter()
            .map(|p| RoutePattern::parse(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ValidationError::InvalidPattern {
                fragment: id.clone(),
                source,
            })?;

        let forward_fragment_headers = self
            .headers
            .iter()
            .map(|h| {
                HeaderName::from_bytes(h.as_bytes()).map_err(|_| ValidationError::InvalidHeaderName {
                    fragment: id.clone(),
                    header: h.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(bad) = self.class_names.iter().find(|c| !is_valid_class_name(c)) {
            return Err(ValidationError::InvalidClassName {
                fragment: id.clone(),
                class_name: bad.clone(),
            }
            .into());
        }

        Ok(FragmentConfig {
            fragment_id: id,
            route_patterns,
            endpoint: self.endpoint,
            pre_piercing_class_names: self.class_names,
            forward_fragment_headers,
            on_ssr_fetch_error: self.fallback,
        })
    }
}

/// Class names are injected into markup verbatim, so they must be a single
/// attribute-safe token.
pub(crate) fn is_valid_class_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '&' | '='))
}

/// Result of a successful path lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub fragment_id: &'a str,
    pub matched_pattern: &'a RoutePattern,
    /// Remainder captured by a trailing wildcard (empty otherwise).
    pub captured: String,
}

/// Ordered set of fragment configurations.
#[derive(Debug, Default, Clone)]
pub struct FragmentRegistry {
    fragments: Vec<FragmentConfig>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fragment. Rejects duplicate ids and fragments without routes.
    pub fn register(&mut self, config: FragmentConfig) -> Result<(), ConfigError> {
        if self.get(&config.fragment_id).is_some() {
            return Err(ValidationError::DuplicateFragment(config.fragment_id).into());
        }
        if config.route_patterns.is_empty() {
            return Err(ValidationError::EmptyRoutePatterns(config.fragment_id).into());
        }

        tracing::debug!(
            fragment_id = %config.fragment_id,
            endpoint = %config.endpoint,
            routes = config.route_patterns.len(),
            "Fragment registered"
        );
        self.fragments.push(config);
        Ok(())
    }

    /// First fragment (in registration order) with a pattern matching `path`.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.fragments.iter().find_map(|fragment| {
            fragment.route_patterns.iter().find_map(|pattern| {
                pattern.match_path(path).map(|captured| RouteMatch {
                    fragment_id: &fragment.fragment_id,
                    matched_pattern: pattern,
                    captured,
                })
            })
        })
    }

    pub fn get(&self, fragment_id: &str) -> Option<&FragmentConfig> {
        self.fragments.iter().find(|f| f.fragment_id == fragment_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FragmentConfig> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(id: &str, routes: &[&str]) -> FragmentConfig {
        let mut builder = FragmentConfig::builder(id, Url::parse("http://127.0.0.1:3000").unwrap());
        for route in routes {
            builder = builder.route(*route);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = FragmentRegistry::new();
        registry.register(fragment("catalog", &["/shop/:_*"])).unwrap();
        registry.register(fragment("sale", &["/shop/sale"])).unwrap();

        let matched = registry.match_path("/shop/sale").unwrap();
        assert_eq!(matched.fragment_id, "catalog");
        assert_eq!(matched.matched_pattern.as_str(), "/shop/:_*");
        assert_eq!(matched.captured, "sale");
    }

    #[test]
    fn test_order_is_priority() {
        let mut registry = FragmentRegistry::new();
        registry.register(fragment("sale", &["/shop/sale"])).unwrap();
        registry.register(fragment("catalog", &["/shop/:_*"])).unwrap();

        assert_eq!(registry.match_path("/shop/sale").unwrap().fragment_id, "sale");
        assert_eq!(registry.match_path("/shop/hats").unwrap().fragment_id, "catalog");
        assert!(registry.match_path("/about").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = FragmentRegistry::new();
        registry.register(fragment("news", &["/news"])).unwrap();
        let err = registry.register(fragment("news", &["/other"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ValidationError::DuplicateFragment(ref id)) if id == "news"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_routes_rejected() {
        let mut registry = FragmentRegistry::new();
        let err = registry.register(fragment("news", &[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(ValidationError::EmptyRoutePatterns(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_builder_validation() {
        let endpoint = Url::parse("http://127.0.0.1:3000").unwrap();
        assert!(FragmentConfig::builder("a", endpoint.clone())
            .route("/x/:id")
            .build()
            .is_err());
        assert!(FragmentConfig::builder("a", endpoint.clone())
            .route("/x")
            .forward_header("bad header")
            .build()
            .is_err());
        assert!(FragmentConfig::builder("a", endpoint)
            .route("/x")
            .pre_piercing_class_name("two words")
            .build()
            .is_err());
    }
}
