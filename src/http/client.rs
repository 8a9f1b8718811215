//! Upstream HTTP client shared by the shell passthrough and the fragment proxy.
//!
//! # Design Decisions
//! - One pooled hyper-util client per component, HTTP and HTTPS origins alike
//! - TLS through rustls with the webpki root store; HTTP/1.1 and HTTP/2 via ALPN

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

/// Pooled client able to reach `http` and `https` origins.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build an upstream client.
pub fn upstream_client() -> UpstreamClient {
    // Errors only when a process-wide provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}
