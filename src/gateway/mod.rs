//! Gateway subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → classify.rs (shell / fragment / not found)
//!     → orchestrator.rs (fetch, rewrite, recover)
//!         → shell.rs (shell passthrough handler)
//!         → fallback.rs (substitute responses on fragment failure)
//! ```

pub mod classify;
pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod shell;

pub use classify::{classify, Classification, FRAGMENT_PATH_PREFIX};
pub use error::GatewayError;
pub use fallback::{FallbackResponse, FetchFailure, SsrFallback, StaticFallback};
pub use orchestrator::{Gateway, GatewayOptions};
pub use shell::{ShellHandler, UpstreamShell};
