//! Client-side reframing and piercing engine.
//!
//! # Data Flow
//! ```text
//! Page (arena DOM + cookies + fetcher + script runtime)
//!     → elements.rs (outlet/host lifecycle, claim protocol)
//!     → reframe.rs (fetch → decode → sandbox parse → move into container)
//!         → sandbox.rs (isolated document, globals, location)
//!         → parser.rs (tree builder, script timing)
//!         → script.rs (pluggable ScriptRuntime)
//! ```
//!
//! # Design Decisions
//! - Single-threaded: `Rc<RefCell<_>>` shared state, `!Send` futures
//! - Concurrent reframes on one page each own a sandbox and a container

pub mod cookies;
pub mod dom;
pub mod elements;
pub mod error;
pub mod fetch;
pub mod parser;
pub mod reframe;
pub mod sandbox;
pub mod script;

pub use cookies::{CookieJar, CORRELATION_COOKIE};
pub use dom::{Dom, NodeId, NodeKind, SharedDom};
pub use elements::{attach_outlets, FragmentHost, FragmentOutlet, OutletReady, Page, PiercingState};
pub use error::{FetchError, PiercingError};
pub use fetch::{ByteStream, FetchRequest, Fetcher, HttpFetcher};
pub use reframe::{reframe, FragmentSource, Reframed};
pub use sandbox::Sandbox;
pub use script::{NoopRuntime, Script, ScriptError, ScriptKind, ScriptRuntime, ScriptScope};
