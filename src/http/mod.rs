//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, upstream URI, identity encoding)
//!     → [gateway orchestrator decides shell or fragment]
//!     → client.rs (pooled HTTP/HTTPS upstream client)
//!     → response.rs (hop-by-hop header stripping)
//!     → Send to client
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod server;

pub use client::{upstream_client, UpstreamClient};
pub use request::{MakeGatewayRequestId, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
