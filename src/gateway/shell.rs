//! Shell passthrough handlers.
//!
//! # Responsibilities
//! - Abstract "the shell's own handler" behind `ShellHandler`
//! - Proxy to a remote shell origin (`UpstreamShell`)
//!
//! # Design Decisions
//! - A shell handler always yields a response; network failures become 502
//! - The gateway never alters a status code the shell decided

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use std::future::Future;
use url::Url;

use crate::http::client::{upstream_client, UpstreamClient};
use crate::http::request::{request_id, request_identity_encoding, upstream_uri};
use crate::http::response::strip_hop_by_hop;

/// The shell application's own request handler.
pub trait ShellHandler: Send + Sync {
    fn call(&self, request: Request<Body>) -> BoxFuture<'static, Response<Body>>;
}

impl<F, Fut> ShellHandler for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    fn call(&self, request: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        Box::pin(self(request))
    }
}

/// Shell served by a remote HTTP origin.
#[derive(Clone)]
pub struct UpstreamShell {
    origin: Url,
    client: UpstreamClient,
}

impl UpstreamShell {
    pub fn new(origin: Url) -> Self {
        Self::with_client(origin, upstream_client())
    }

    pub fn with_client(origin: Url, client: UpstreamClient) -> Self {
        Self { origin, client }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

impl ShellHandler for UpstreamShell {
    fn call(&self, request: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        let origin = self.origin.clone();
        let client = self.client.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let request_id = request_id(&parts.headers).to_string();

            let uri = match upstream_uri(&origin, parts.uri.path(), parts.uri.query()) {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Invalid shell upstream URI");
                    return bad_gateway();
                }
            };
            strip_hop_by_hop(&mut parts.headers);
            request_identity_encoding(&mut parts.headers);
            parts.uri = uri;

            match client.request(Request::from_parts(parts, body)).await {
                Ok(response) => {
                    let (mut parts, body) = response.into_parts();
                    strip_hop_by_hop(&mut parts.headers);
                    Response::from_parts(parts, Body::new(body))
                }
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Shell upstream error");
                    bad_gateway()
                }
            }
        })
    }
}

fn bad_gateway() -> Response<Body> {
    let mut response = Response::new(Body::from("Shell upstream request failed"));
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
}
