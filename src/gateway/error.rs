//! Error types for the gateway request path.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors raised while routing a request to a fragment origin.
///
/// None of these ever escape the orchestrator: each is converted into a
/// valid HTTP response, through the fragment's fallback when one exists.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request could not be turned into an upstream request.
    #[error("cannot route request to `{target}`: {reason}")]
    Routing { target: String, reason: String },

    /// Network failure talking to the fragment origin.
    #[error("fragment origin fetch failed: {0}")]
    OriginFetch(#[source] hyper_util::client::legacy::Error),

    /// The fragment origin answered with an error status.
    #[error("fragment origin responded with status {0}")]
    OriginStatus(StatusCode),

    /// The body being rewritten failed mid-stream. Bytes already buffered
    /// by the rewriter are flushed unmodified before this is raised.
    #[error("rewritten body failed: {0}")]
    Rewrite(#[source] axum::BoxError),
}

impl GatewayError {
    /// Status surfaced to the client when no fallback is configured.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Routing { .. }
            | GatewayError::OriginFetch(_)
            | GatewayError::Rewrite(_) => StatusCode::BAD_GATEWAY,
            GatewayError::OriginStatus(status) => *status,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Routing { .. } => "routing",
            GatewayError::OriginFetch(_) => "origin_fetch",
            GatewayError::OriginStatus(_) => "origin_status",
            GatewayError::Rewrite(_) => "rewrite",
        }
    }
}
