//! Streaming HTML subsystem.
//!
//! # Data Flow
//! ```text
//! Origin body (chunked bytes)
//!     → body.rs (pull-based http_body wrapper)
//!     → tokenizer.rs (bytes → tokens, one construct buffered at most)
//!     → rewriter.rs (inject styles, decorate piercing hosts)
//!     → Client body (chunked bytes)
//! ```
//!
//! # Design Decisions
//! - Token-level rewriting, never a full document parse
//! - The tokenizer is shared with the client-side sandbox tree builder

pub mod body;
pub mod rewriter;
pub mod tokenizer;

pub use body::RewriteBody;
pub use rewriter::{DocumentState, HtmlRewriter, RewriteSettings};
pub use tokenizer::{Token, Tokenizer};

/// Placeholder element rendered by the shell where a fragment belongs.
pub const OUTLET_TAG: &str = "piercing-fragment-outlet";

/// Element that owns a fragment's markup once pierced or reframed.
pub const HOST_TAG: &str = "piercing-fragment-host";

/// Attribute naming the fragment on both piercing elements.
pub const FRAGMENT_ID_ATTRIBUTE: &str = "fragment-id";

/// Whether a `Content-Type` header value denotes an HTML document.
pub fn is_html_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("text/html"))
        .unwrap_or(false)
}
