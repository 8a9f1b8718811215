//! Fragment piercing gateway.
//!
//! Serves a shell application while stitching independently deployed
//! fragments into its pages: server-side by proxying and stream-rewriting
//! HTML, client-side by reframing fragment documents into the live DOM.
//!
//! ```text
//!                    ┌──────────────────────────── gateway ───────────────────────────┐
//!  Client ──────────▶│ http::server → gateway::classify → orchestrator ──▶ shell / fragment origin
//!         ◀──────────│              html::RewriteBody (styles, host decoration) ◀──── │
//!                    └────────────────────────────────────────────────────────────────┘
//!
//!  Page (client) ──▶ piercing::elements (outlet/host) → piercing::reframe → Sandbox → DOM
//! ```

// Core subsystems
pub mod config;
pub mod gateway;
pub mod html;
pub mod http;
pub mod routing;

// Client-side engine
pub mod piercing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewaySettings;
pub use gateway::{Gateway, GatewayOptions};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use routing::{FragmentConfig, FragmentRegistry};
