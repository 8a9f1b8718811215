//! Fragment markup fetching.
//!
//! The reframing engine only needs "give me a byte stream for this URL";
//! `Fetcher` keeps the transport pluggable. `HttpFetcher` streams with
//! reqwest so markup is parsed as it arrives.

use bytes::Bytes;
use futures_util::future::LocalBoxFuture;
use futures_util::stream::LocalBoxStream;
use futures_util::{StreamExt, TryStreamExt};
use url::Url;

use crate::piercing::error::FetchError;

/// A fragment request issued by an outlet or host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    /// `Cookie` header value carrying the page's live cookies.
    pub cookie: Option<String>,
}

/// Body of a fetched fragment, chunk by chunk.
pub type ByteStream = LocalBoxStream<'static, Result<Bytes, FetchError>>;

/// Transport used to load fragment markup.
pub trait Fetcher {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'_, Result<ByteStream, FetchError>>;
}

/// Fetcher backed by a reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'_, Result<ByteStream, FetchError>> {
        Box::pin(async move {
            let mut builder = self.client.get(request.url.clone());
            if let Some(cookie) = &request.cookie {
                builder = builder.header(reqwest::header::COOKIE, cookie);
            }

            let response = builder.send().await?;
            tracing::debug!(
                url = %request.url,
                status = response.status().as_u16(),
                "Fragment response received"
            );
            // Error statuses still carry renderable markup (gateway fallbacks),
            // so the body is streamed regardless of status.
            Ok::<ByteStream, FetchError>(response.bytes_stream().map_err(FetchError::from).boxed_local())
        })
    }
}
