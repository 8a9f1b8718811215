//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Build upstream URIs from an origin base URL and the inbound path
//! - Ask origins for uncompressed bodies so HTML can be rewritten
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The origin base path is kept: `http://host/app` + `/news` → `/app/news`

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;

use crate::gateway::error::GatewayError;

/// Correlation header set on every request and echoed on every response.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeGatewayRequestId;

impl MakeRequestId for MakeGatewayRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

/// Request ID from the headers, or `"unknown"` when the layer did not run.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Replace any `Accept-Encoding` with `identity`. The rewriter works on
/// markup, never on compressed bytes.
pub fn request_identity_encoding(headers: &mut HeaderMap) {
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
}

/// Join `base` with an inbound `path` and `query` into an absolute URI.
pub fn upstream_uri(base: &Url, path: &str, query: Option<&str>) -> Result<Uri, GatewayError> {
    let mut target = format!(
        "{}{}",
        base.origin().ascii_serialization(),
        base.path().trim_end_matches('/')
    );
    if path.starts_with('/') {
        target.push_str(path);
    } else {
        target.push('/');
        target.push_str(path);
    }
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }

    target.parse::<Uri>().map_err(|e| GatewayError::Routing {
        target,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_uri_joins_paths() {
        let base = Url::parse("http://127.0.0.1:4001").unwrap();
        let uri = upstream_uri(&base, "/news/today", Some("page=2")).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:4001/news/today?page=2");

        let base = Url::parse("http://fragments.local/app/").unwrap();
        let uri = upstream_uri(&base, "/", None).unwrap();
        assert_eq!(uri.to_string(), "http://fragments.local/app/");

        let base = Url::parse("https://fragments.example:8443").unwrap();
        let uri = upstream_uri(&base, "/a", None).unwrap();
        assert_eq!(uri.to_string(), "https://fragments.example:8443/a");
    }

    #[test]
    fn test_identity_encoding_replaces_browser_preference() {
        let mut headers = HeaderMap::new();
        headers.append(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        headers.append(header::ACCEPT_ENCODING, HeaderValue::from_static("zstd"));
        request_identity_encoding(&mut headers);
        let values: Vec<_> = headers.get_all(header::ACCEPT_ENCODING).iter().collect();
        assert_eq!(values, [&HeaderValue::from_static("identity")]);
    }

    #[test]
    fn test_request_id_generated() {
        let request = Request::new(());
        let id = MakeGatewayRequestId.make_request_id(&request).unwrap();
        let value = id.header_value().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(value).is_ok());
    }

    #[test]
    fn test_request_id_missing() {
        assert_eq!(request_id(&HeaderMap::new()), "unknown");
    }
}
