//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator, server, reframing engine produce:
//!     → logging.rs (structured log events with request_id / fragment_id)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout; pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing in production
//! - Request ID flows from the server layer into every gateway log event
//! - Metrics are cheap: recording without an installed exporter is a no-op

pub mod logging;
pub mod metrics;
