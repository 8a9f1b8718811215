//! Response body wrapper that rewrites HTML while it streams.
//!
//! # Design Decisions
//! - Pull-based: the origin body is only polled when the client polls us,
//!   so downstream backpressure reaches the origin connection
//! - Dropping this body drops the origin body, which aborts the origin fetch
//! - Trailers are forwarded after the rewriter has been flushed
//! - If the origin body fails, whatever the rewriter buffered is flushed
//!   verbatim before the error is raised as `GatewayError::Rewrite`

use axum::BoxError;
use bytes::Bytes;
use http_body::{Body, Frame};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::gateway::error::GatewayError;
use crate::html::rewriter::HtmlRewriter;

/// Body that feeds every data frame of `inner` through an [`HtmlRewriter`].
pub struct RewriteBody<B> {
    inner: B,
    rewriter: HtmlRewriter,
    pending_trailers: Option<Frame<Bytes>>,
    pending_error: Option<GatewayError>,
    done: bool,
}

impl<B> RewriteBody<B> {
    pub fn new(inner: B, rewriter: HtmlRewriter) -> Self {
        Self {
            inner,
            rewriter,
            pending_trailers: None,
            pending_error: None,
            done: false,
        }
    }
}

impl<B> Body for RewriteBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        loop {
            if let Some(trailers) = self.pending_trailers.take() {
                return Poll::Ready(Some(Ok(trailers)));
            }
            if let Some(error) = self.pending_error.take() {
                return Poll::Ready(Some(Err(error.into())));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut self.inner).poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => {
                        let out = self.rewriter.write(&data);
                        // an unterminated construct swallowed the whole chunk
                        if out.is_empty() {
                            continue;
                        }
                        return Poll::Ready(Some(Ok(Frame::data(out))));
                    }
                    Err(trailers) => {
                        let tail = self.rewriter.end();
                        if tail.is_empty() {
                            return Poll::Ready(Some(Ok(trailers)));
                        }
                        self.pending_trailers = Some(trailers);
                        return Poll::Ready(Some(Ok(Frame::data(tail))));
                    }
                },
                Some(Err(e)) => {
                    self.done = true;
                    let error = GatewayError::Rewrite(e.into());
                    let tail = self.rewriter.end();
                    if tail.is_empty() {
                        return Poll::Ready(Some(Err(error.into())));
                    }
                    self.pending_error = Some(error);
                    return Poll::Ready(Some(Ok(Frame::data(tail))));
                }
                None => {
                    self.done = true;
                    let tail = self.rewriter.end();
                    if tail.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(Frame::data(tail))));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done && self.pending_trailers.is_none() && self.pending_error.is_none()
    }
}
