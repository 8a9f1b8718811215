//! Gateway orchestrator.
//!
//! # Responsibilities
//! - Classify each request (shell, fragment, not found)
//! - Proxy fragment requests with an allowlist of forwarded headers
//! - Stream HTML responses through the rewriter
//! - Turn every fragment failure into a valid response
//!
//! # Data Flow
//! ```text
//! Request
//!   → classify
//!       ShellPassthrough → shell handler → rewrite (HTML only) → Response
//!       FragmentProxy    → fragment origin ─ ok ─→ rewrite (HTML only) → Response
//!                                           └ err/≥400 → fallback or generic error
//!       NotFound         → shell handler (untouched) → Response
//! ```
//!
//! # Design Decisions
//! - Stateless between requests; all shared state is immutable behind `Arc`
//! - Response bodies are never buffered; rewriting happens as the client polls
//! - Fallback responses are returned as produced (not rewritten)
//! - Origins are asked for identity encoding; a body that still arrives
//!   compressed is passed through unrewritten

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Response};
use std::sync::Arc;
use std::time::Instant;

use crate::config::schema::{GatewaySettings, Mode, DEFAULT_PRE_PIERCING_STYLES};
use crate::gateway::classify::{classify, Classification};
use crate::gateway::error::GatewayError;
use crate::gateway::fallback::FetchFailure;
use crate::gateway::shell::ShellHandler;
use crate::html::{is_html_content_type, HtmlRewriter, RewriteBody, RewriteSettings};
use crate::http::client::{upstream_client, UpstreamClient};
use crate::http::request::{request_id, request_identity_encoding, upstream_uri};
use crate::http::response::strip_hop_by_hop;
use crate::observability::metrics;
use crate::routing::{FragmentConfig, FragmentRegistry};

/// Process-wide gateway options.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Style block injected once into every shell document.
    pub pre_piercing_styles: String,
    pub mode: Mode,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            pre_piercing_styles: DEFAULT_PRE_PIERCING_STYLES.to_string(),
            mode: Mode::default(),
        }
    }
}

impl From<&GatewaySettings> for GatewayOptions {
    fn from(settings: &GatewaySettings) -> Self {
        Self {
            pre_piercing_styles: settings.pre_piercing_styles.clone(),
            mode: settings.mode,
        }
    }
}

/// Request orchestrator. Cheap to clone; safe to share across tasks.
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<FragmentRegistry>,
    rewrite: Arc<RewriteSettings>,
    mode: Mode,
    client: UpstreamClient,
}

impl Gateway {
    pub fn new(registry: FragmentRegistry, options: GatewayOptions) -> Self {
        let rewrite = Arc::new(RewriteSettings::new(options.pre_piercing_styles, &registry));
        Self {
            registry: Arc::new(registry),
            rewrite,
            mode: options.mode,
            client: upstream_client(),
        }
    }

    pub fn registry(&self) -> &FragmentRegistry {
        &self.registry
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Classify `request` without handling it.
    pub fn classify<B>(&self, request: &Request<B>) -> Classification {
        classify(&self.registry, request.method(), request.uri().path())
    }

    /// Handle one request. Never fails: every error becomes a response.
    pub async fn handle<S>(&self, request: Request<Body>, shell: &S) -> Response<Body>
    where
        S: ShellHandler + ?Sized,
    {
        let start = Instant::now();
        let request_id = request_id(request.headers()).to_string();
        let classification = self.classify(&request);

        tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            classification = classification.label(),
            "Classified request"
        );

        let response = match &classification {
            Classification::ShellPassthrough => {
                let response = shell.call(request).await;
                self.rewrite_html(response)
            }
            Classification::FragmentProxy { fragment_id, path } => {
                match self.registry.get(fragment_id) {
                    Some(fragment) => self.proxy_fragment(fragment, path, request).await,
                    None => shell.call(request).await,
                }
            }
            Classification::NotFound => shell.call(request).await,
        };

        metrics::record_request(classification.label(), response.status().as_u16(), start);
        tracing::debug!(
            request_id = %request_id,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    /// Stream an HTML response through the rewriter. Other content types
    /// and content-encoded bodies are returned untouched.
    pub fn rewrite_html(&self, response: Response<Body>) -> Response<Body> {
        let headers = response.headers();
        let is_html = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_html_content_type);
        let is_encoded = headers
            .get_all(header::CONTENT_ENCODING)
            .iter()
            .any(|v| !v.as_bytes().eq_ignore_ascii_case(b"identity"));
        if !is_html || is_encoded {
            if is_html {
                tracing::warn!(
                    encoding = ?headers.get(header::CONTENT_ENCODING),
                    "Encoded HTML response passed through without rewriting"
                );
            }
            return response;
        }

        let (mut parts, body) = response.into_parts();
        // The rewritten length is unknown; the response goes out chunked.
        parts.headers.remove(header::CONTENT_LENGTH);
        let rewriter = HtmlRewriter::new(self.rewrite.clone());
        Response::from_parts(parts, Body::new(RewriteBody::new(body, rewriter)))
    }

    async fn proxy_fragment(
        &self,
        fragment: &FragmentConfig,
        path: &str,
        request: Request<Body>,
    ) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let request_id = request_id(&parts.headers).to_string();

        let uri = match upstream_uri(&fragment.endpoint, path, parts.uri.query()) {
            Ok(uri) => uri,
            Err(e) => return self.recover(fragment, path, &request_id, e),
        };

        let mut headers = HeaderMap::new();
        for name in &fragment.forward_fragment_headers {
            for value in parts.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        request_identity_encoding(&mut headers);
        let body = if parts.method.is_safe() {
            Body::empty()
        } else {
            body
        };

        tracing::debug!(
            request_id = %request_id,
            fragment_id = %fragment.fragment_id,
            method = %parts.method,
            upstream = %uri,
            "Fetching fragment"
        );

        let mut upstream = Request::new(body);
        *upstream.method_mut() = parts.method;
        *upstream.uri_mut() = uri;
        *upstream.headers_mut() = headers;

        match self.client.request(upstream).await {
            Ok(response) if response.status().as_u16() >= 400 => {
                let status = response.status();
                self.recover(fragment, path, &request_id, GatewayError::OriginStatus(status))
            }
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                self.rewrite_html(Response::from_parts(parts, Body::new(body)))
            }
            Err(e) => self.recover(fragment, path, &request_id, GatewayError::OriginFetch(e)),
        }
    }

    fn recover(
        &self,
        fragment: &FragmentConfig,
        path: &str,
        request_id: &str,
        error: GatewayError,
    ) -> Response<Body> {
        tracing::warn!(
            request_id = %request_id,
            fragment_id = %fragment.fragment_id,
            path = %path,
            error = %error,
            fallback = fragment.on_ssr_fetch_error.is_some(),
            "Fragment fetch failed"
        );
        metrics::record_fallback(&fragment.fragment_id, error.kind());

        let status = error.status();
        match &fragment.on_ssr_fetch_error {
            Some(fallback) => {
                let failure = FetchFailure {
                    fragment_id: fragment.fragment_id.clone(),
                    path: path.to_string(),
                    error,
                };
                fallback.on_ssr_fetch_error(&failure).into_response()
            }
            None => {
                let message = if self.mode.is_development() {
                    format!(
                        "Failed to fetch fragment `{}` ({}): {}",
                        fragment.fragment_id, path, error
                    )
                } else {
                    format!(
                        "Failed to fetch fragment: {}",
                        status.canonical_reason().unwrap_or("error")
                    )
                };
                let mut response = Response::new(Body::from(message));
                *response.status_mut() = status;
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    header::HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                response
            }
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("fragments", &self.registry.len())
            .field("mode", &self.mode)
            .finish()
    }
}
