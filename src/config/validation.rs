//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check fragment ids are unique and every fragment owns a route
//! - Validate route patterns, endpoints, header names and class names
//! - Validate listener and shell addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewaySettings → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewaySettings;
use crate::routing::registry::is_valid_class_name;
use crate::routing::{PatternError, RoutePattern};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("fragment `{0}` is registered more than once")]
    DuplicateFragment(String),

    #[error("fragment `{0}` has no route patterns")]
    EmptyRoutePatterns(String),

    #[error("fragment `{fragment}`: {source}")]
    InvalidPattern {
        fragment: String,
        #[source]
        source: PatternError,
    },

    #[error("fragment `{fragment}` has an invalid endpoint: {reason}")]
    InvalidEndpoint { fragment: String, reason: String },

    #[error("fragment `{fragment}` forwards invalid header name `{header}`")]
    InvalidHeaderName { fragment: String, header: String },

    #[error("fragment `{fragment}` has invalid pre-piercing class name `{class_name}`")]
    InvalidClassName { fragment: String, class_name: String },

    #[error("fragment `{fragment}` fallback has invalid status {status}")]
    InvalidFallbackStatus { fragment: String, status: u16 },

    #[error("fragment `{fragment}` fallback has invalid content type `{content_type}`")]
    InvalidFallbackContentType { fragment: String, content_type: String },

    #[error("invalid shell origin `{0}`")]
    InvalidShellOrigin(String),

    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Parse an origin URL: `http` or `https` with a host.
pub fn parse_origin(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme `{}` (expected http or https)", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("origin must not carry a query or fragment".to_string());
    }
    Ok(url)
}

/// Validate the whole configuration, collecting every problem.
pub fn validate_config(settings: &GatewaySettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            settings.listener.bind_address.clone(),
        ));
    }

    if parse_origin(&settings.shell.origin).is_err() {
        errors.push(ValidationError::InvalidShellOrigin(settings.shell.origin.clone()));
    }

    if settings.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let mut seen = HashSet::new();
    for fragment in &settings.fragments {
        let id = &fragment.id;

        if !seen.insert(id.as_str()) {
            errors.push(ValidationError::DuplicateFragment(id.clone()));
        }

        if fragment.routes.is_empty() {
            errors.push(ValidationError::EmptyRoutePatterns(id.clone()));
        }
        for route in &fragment.routes {
            if let Err(source) = RoutePattern::parse(route) {
                errors.push(ValidationError::InvalidPattern {
                    fragment: id.clone(),
                    source,
                });
            }
        }

        if let Err(reason) = parse_origin(&fragment.endpoint) {
            errors.push(ValidationError::InvalidEndpoint {
                fragment: id.clone(),
                reason,
            });
        }

        for header in &fragment.forward_headers {
            if axum::http::HeaderName::from_bytes(header.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidHeaderName {
                    fragment: id.clone(),
                    header: header.clone(),
                });
            }
        }

        for class_name in &fragment.pre_piercing_class_names {
            if !is_valid_class_name(class_name) {
                errors.push(ValidationError::InvalidClassName {
                    fragment: id.clone(),
                    class_name: class_name.clone(),
                });
            }
        }

        if let Some(fallback) = &fragment.fallback {
            if axum::http::StatusCode::from_u16(fallback.status).is_err() {
                errors.push(ValidationError::InvalidFallbackStatus {
                    fragment: id.clone(),
                    status: fallback.status,
                });
            }
            if axum::http::HeaderValue::from_str(&fallback.content_type).is_err() {
                errors.push(ValidationError::InvalidFallbackContentType {
                    fragment: id.clone(),
                    content_type: fallback.content_type.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FallbackDefinition, FragmentDefinition};

    fn fragment(id: &str) -> FragmentDefinition {
        FragmentDefinition {
            id: id.to_string(),
            routes: vec![format!("/{id}/:rest*")],
            endpoint: "http://127.0.0.1:4000".to_string(),
            pre_piercing_class_names: Vec::new(),
            forward_headers: Vec::new(),
            fallback: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewaySettings::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut settings = GatewaySettings::default();
        settings.listener.bind_address = "nowhere".to_string();
        settings.shell.origin = "ftp://shell.example".to_string();

        let mut bad = fragment("news");
        bad.routes = vec!["/news/:id".to_string()];
        bad.endpoint = "not a url".to_string();
        bad.forward_headers = vec!["x ok".to_string()];
        bad.pre_piercing_class_names = vec!["a b".to_string()];
        bad.fallback = Some(FallbackDefinition {
            status: 1000,
            content_type: "text/html".to_string(),
            body: String::new(),
        });
        settings.fragments = vec![bad, fragment("news")];

        let errors = validate_config(&settings).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidBindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::InvalidShellOrigin("ftp://shell.example".into())));
        assert!(errors.contains(&ValidationError::DuplicateFragment("news".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidPattern { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidEndpoint { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidHeaderName { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidClassName { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidFallbackStatus { .. })));
    }

    #[test]
    fn test_empty_routes() {
        let mut settings = GatewaySettings::default();
        let mut f = fragment("cart");
        f.routes.clear();
        settings.fragments.push(f);
        assert_eq!(
            validate_config(&settings),
            Err(vec![ValidationError::EmptyRoutePatterns("cart".into())])
        );
    }

    #[test]
    fn test_parse_origin() {
        assert!(parse_origin("http://127.0.0.1:4000").is_ok());
        assert!(parse_origin("http://fragments.internal/base/").is_ok());
        assert!(parse_origin("https://fragments.example:8443/app").is_ok());
        assert!(parse_origin("ftp://127.0.0.1").is_err());
        assert!(parse_origin("unix:/tmp/socket").is_err());
        assert!(parse_origin("http://h/?q=1").is_err());
    }
}
