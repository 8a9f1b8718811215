//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Style block injected into every shell document when none is configured.
///
/// Hosts that have not been pierced yet are taken out of the flow so their
/// eventual move into an outlet does not shift the page.
pub const DEFAULT_PRE_PIERCING_STYLES: &str = "<style>\
piercing-fragment-host{display:block}\
piercing-fragment-outlet>piercing-fragment-host{position:static}\
body>piercing-fragment-host{position:absolute;z-index:-1;opacity:0;pointer-events:none}\
</style>";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The shell origin every non-fragment request is passed through to.
    pub shell: ShellConfig,

    /// Logging and error verbosity mode.
    pub mode: Mode,

    /// Style block injected verbatim once into every shell document.
    pub pre_piercing_styles: String,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Fragment definitions, in routing priority order.
    pub fragments: Vec<FragmentDefinition>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            shell: ShellConfig::default(),
            mode: Mode::default(),
            pre_piercing_styles: DEFAULT_PRE_PIERCING_STYLES.to_string(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            fragments: Vec::new(),
        }
    }
}

/// Gateway mode. Affects logging format and error verbosity only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    pub fn is_development(self) -> bool {
        self == Mode::Development
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Shell origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Base URL of the shell application (e.g., "http://127.0.0.1:3000").
    pub origin: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// One fragment as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FragmentDefinition {
    /// Unique fragment identifier.
    pub id: String,

    /// Route patterns owned by the fragment (`/news`, `/news/:rest*`).
    pub routes: Vec<String>,

    /// Base URL of the fragment origin.
    pub endpoint: String,

    /// Classes added to pre-rendered hosts of this fragment in the shell document.
    #[serde(default)]
    pub pre_piercing_class_names: Vec<String>,

    /// Request headers forwarded from the shell request to the fragment.
    #[serde(default)]
    pub forward_headers: Vec<String>,

    /// Response served in place of a failed fragment fetch.
    #[serde(default)]
    pub fallback: Option<FallbackDefinition>,
}

/// Static fallback response for a fragment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackDefinition {
    /// Status code of the substitute response (default: 200).
    #[serde(default = "default_fallback_status")]
    pub status: u16,

    /// Content type of the substitute response.
    #[serde(default = "default_fallback_content_type")]
    pub content_type: String,

    /// Body of the substitute response.
    pub body: String,
}

fn default_fallback_status() -> u16 {
    200
}

fn default_fallback_content_type() -> String {
    "text/html; charset=utf-8".to_string()
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time to produce response headers) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
