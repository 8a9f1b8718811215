//! Error types for the client-side piercing engine.

use thiserror::Error;

/// Errors that reject a single reframe or piercing element.
#[derive(Debug, Error)]
pub enum PiercingError {
    /// The sandbox could not be set up (container missing or not an element).
    #[error("cannot create sandbox: {0}")]
    SandboxCreation(String),

    /// A piercing element was attached without its `fragment-id`.
    #[error("<{tag}> is missing the required `fragment-id` attribute")]
    MissingFragmentId { tag: String },

    #[error("invalid fragment URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors from fetching fragment markup.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
