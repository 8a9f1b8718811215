//! Substitute responses for failed fragment fetches.
//!
//! # Responsibilities
//! - Define the `SsrFallback` hook invoked on origin failure
//! - Provide a static, config-driven fallback implementation
//!
//! # Design Decisions
//! - Fallbacks are synchronous and infallible: they always yield a response
//! - Any `Fn(&FetchFailure) -> FallbackResponse` closure is a fallback

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use bytes::Bytes;

use crate::config::schema::FallbackDefinition;
use crate::config::validation::ValidationError;
use crate::gateway::error::GatewayError;

/// Context handed to a fallback when a fragment fetch fails.
#[derive(Debug)]
pub struct FetchFailure {
    pub fragment_id: String,
    /// Path that was requested from the fragment origin.
    pub path: String,
    pub error: GatewayError,
}

/// Response produced by a fallback.
#[derive(Debug, Clone)]
pub struct FallbackResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FallbackResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A `200 OK` HTML fallback.
    pub fn html(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Hook producing a substitute response when a fragment origin fails.
pub trait SsrFallback: Send + Sync {
    fn on_ssr_fetch_error(&self, failure: &FetchFailure) -> FallbackResponse;
}

impl<F> SsrFallback for F
where
    F: Fn(&FetchFailure) -> FallbackResponse + Send + Sync,
{
    fn on_ssr_fetch_error(&self, failure: &FetchFailure) -> FallbackResponse {
        self(failure)
    }
}

/// Fallback serving the same configured response for every failure.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    status: StatusCode,
    content_type: HeaderValue,
    body: Bytes,
}

impl StaticFallback {
    pub fn new(status: StatusCode, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn from_definition(
        fragment_id: &str,
        definition: &FallbackDefinition,
    ) -> Result<Self, ValidationError> {
        let status = StatusCode::from_u16(definition.status).map_err(|_| {
            ValidationError::InvalidFallbackStatus {
                fragment: fragment_id.to_string(),
                status: definition.status,
            }
        })?;
        let content_type = HeaderValue::from_str(&definition.content_type).map_err(|_| {
            ValidationError::InvalidFallbackContentType {
                fragment: fragment_id.to_string(),
                content_type: definition.content_type.clone(),
            }
        })?;
        Ok(Self::new(status, content_type, definition.body.clone()))
    }
}

impl SsrFallback for StaticFallback {
    fn on_ssr_fetch_error(&self, _failure: &FetchFailure) -> FallbackResponse {
        FallbackResponse::new(self.status, self.body.clone())
            .with_header(header::CONTENT_TYPE, self.content_type.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_fallback() {
        let fallback = |failure: &FetchFailure| {
            FallbackResponse::html(format!("<p>{} failed</p>", failure.fragment_id))
        };
        let response = fallback.on_ssr_fetch_error(&FetchFailure {
            fragment_id: "news".to_string(),
            path: "/news".to_string(),
            error: GatewayError::OriginStatus(StatusCode::INTERNAL_SERVER_ERROR),
        });
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"<p>news failed</p>");
    }

    #[test]
    fn test_static_fallback_from_definition() {
        let definition = FallbackDefinition {
            status: 503,
            content_type: "text/plain".to_string(),
            body: "down".to_string(),
        };
        let fallback = StaticFallback::from_definition("news", &definition).unwrap();
        let response = fallback
            .on_ssr_fetch_error(&FetchFailure {
                fragment_id: "news".to_string(),
                path: "/".to_string(),
                error: GatewayError::OriginStatus(StatusCode::BAD_GATEWAY),
            })
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }
}
