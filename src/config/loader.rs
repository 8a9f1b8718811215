//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::schema::GatewaySettings;
use crate::config::validation::{parse_origin, validate_config, ValidationError};
use crate::gateway::fallback::StaticFallback;
use crate::routing::{FragmentConfig, FragmentRegistry};

/// Error type for configuration loading and fragment registration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewaySettings, ConfigError> {
    let settings: GatewaySettings = toml::from_str(content)?;
    validate_config(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewaySettings, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Compile the configured fragments into a registry, preserving file order.
pub fn build_registry(settings: &GatewaySettings) -> Result<FragmentRegistry, ConfigError> {
    let mut registry = FragmentRegistry::new();

    for definition in &settings.fragments {
        let endpoint = parse_origin(&definition.endpoint).map_err(|reason| {
            ValidationError::InvalidEndpoint {
                fragment: definition.id.clone(),
                reason,
            }
        })?;

        let mut builder = FragmentConfig::builder(definition.id.clone(), endpoint);
        for route in &definition.routes {
            builder = builder.route(route.clone());
        }
        for class_name in &definition.pre_piercing_class_names {
            builder = builder.pre_piercing_class_name(class_name.clone());
        }
        for header in &definition.forward_headers {
            builder = builder.forward_header(header.clone());
        }
        if let Some(fallback) = &definition.fallback {
            let fallback = StaticFallback::from_definition(&definition.id, fallback)?;
            builder = builder.on_ssr_fetch_error_arc(Arc::new(fallback));
        }

        registry.register(builder.build()?)?;
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Mode;

    const SAMPLE: &str = r#"
mode = "development"

[listener]
bind_address = "127.0.0.1:9000"

[shell]
origin = "http://127.0.0.1:3000"

[[fragments]]
id = "news"
routes = ["/news/:rest*"]
endpoint = "http://127.0.0.1:4001"
pre_piercing_class_names = ["news-pre"]
forward_headers = ["cookie", "x-fragment-name"]

[fragments.fallback]
status = 200
body = "<p>News is unavailable</p>"

[[fragments]]
id = "shop"
routes = ["/shop/:_*", "/cart"]
endpoint = "http://127.0.0.1:4002/app"
"#;

    #[test]
    fn test_parse_sample() {
        let settings = parse_config(SAMPLE).unwrap();
        assert_eq!(settings.mode, Mode::Development);
        assert_eq!(settings.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(settings.fragments.len(), 2);
        assert_eq!(
            settings.fragments[0].fallback.as_ref().unwrap().content_type,
            "text/html; charset=utf-8"
        );
        // Defaults fill the sections left out
        assert_eq!(settings.timeouts.request_secs, 30);
        assert!(settings.pre_piercing_styles.starts_with("<style>"));
    }

    #[test]
    fn test_build_registry_preserves_order() {
        let settings = parse_config(SAMPLE).unwrap();
        let registry = build_registry(&settings).unwrap();
        let ids: Vec<_> = registry.iter().map(|f| f.fragment_id.as_str()).collect();
        assert_eq!(ids, ["news", "shop"]);

        let news = registry.get("news").unwrap();
        assert!(news.on_ssr_fetch_error.is_some());
        assert_eq!(news.forward_fragment_headers.len(), 2);
        assert_eq!(registry.match_path("/cart").unwrap().fragment_id, "shop");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = parse_config("[[fragments]]\nid = \"x\"\nroutes = []\nendpoint = \"http://h\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("has no route patterns"));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(parse_config("mode = "), Err(ConfigError::Parse(_))));
    }
}
