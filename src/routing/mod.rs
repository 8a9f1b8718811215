//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → registry.rs (fragments in registration order)
//!     → matcher.rs (evaluate each fragment's route patterns)
//!     → Return: RouteMatch { fragment_id, matched_pattern } or None
//!
//! Registry construction (at startup):
//!     FragmentConfig[]
//!     → Compile route patterns
//!     → Reject duplicate ids / empty route lists
//!     → Freeze as immutable registry
//! ```
//!
//! # Design Decisions
//! - Registry built at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same fragment
//! - First match wins (ordered by registration)

pub mod matcher;
pub mod registry;

pub use matcher::{PatternError, RoutePattern};
pub use registry::{FragmentConfig, FragmentConfigBuilder, FragmentRegistry, RouteMatch};
