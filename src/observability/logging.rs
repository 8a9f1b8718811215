//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Mode;

/// Install the global subscriber. Returns `false` if one was already set
/// (as happens when tests initialize logging more than once).
pub fn init(mode: Mode, level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("fragment_gateway={level},tower_http={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if mode.is_development() {
        registry.with(tracing_subscriber::fmt::layer().pretty()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    };
    result.is_ok()
}
