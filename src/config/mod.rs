//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewaySettings (validated, immutable)
//!     → loader::build_registry → FragmentRegistry
//!     → shared via Arc with the gateway
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{build_registry, load_config, parse_config, ConfigError};
pub use schema::{
    FallbackDefinition, FragmentDefinition, GatewaySettings, ListenerConfig, Mode,
    ObservabilityConfig, ShellConfig, TimeoutConfig, DEFAULT_PRE_PIERCING_STYLES,
};
pub use validation::ValidationError;
