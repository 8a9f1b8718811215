//! Reframing: stream a fragment document through a sandbox into a container.
//!
//! # Data Flow
//! ```text
//! FragmentSource
//!     → fetch (URL) or in-memory markup
//!     → Utf8Decoder (chunk boundaries may split characters)
//!     → TreeBuilder in a fresh Sandbox (classic scripts run as parsed)
//!     → stream complete: async, then deferred/module scripts
//!     → Sandbox::transfer (children move into the container,
//!       id lookups redirected)
//! ```
//!
//! # Design Decisions
//! - The sandbox is created before fetching; a bad container costs no request
//! - Fetch failures never reject: the container shows the failure text
//! - DOM borrows are scoped to one chunk and never held across `.await`

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::rc::Rc;
use url::Url;

use crate::piercing::dom::NodeId;
use crate::piercing::elements::Page;
use crate::piercing::error::{FetchError, PiercingError};
use crate::piercing::fetch::{ByteStream, FetchRequest};
use crate::piercing::parser::TreeBuilder;
use crate::piercing::sandbox::Sandbox;
use crate::piercing::script::ScriptRuntime;

/// Where a fragment's document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentSource {
    /// Fetch the document from this URL.
    Url(Url),
    /// Already-available document markup.
    Markup(String),
}

/// Outcome of a completed reframe.
#[derive(Debug)]
pub struct Reframed {
    pub container: NodeId,
    /// The sandbox stays alive for scripts that captured it; its lookups now
    /// resolve inside the container.
    pub sandbox: Rc<Sandbox>,
    pub scripts_executed: usize,
    /// Failure text rendered instead of the fragment, if the fetch failed.
    pub fetch_error: Option<String>,
}

/// Reframe `source` into `container` on `page`.
pub async fn reframe(
    page: &Page,
    source: FragmentSource,
    container: NodeId,
) -> Result<Reframed, PiercingError> {
    let sandbox = {
        let mut dom = page.dom().borrow_mut();
        Rc::new(Sandbox::create(&mut dom, container, page.location().clone())?)
    };
    let runtime = page.runtime();
    let ctx: Option<(&Sandbox, &dyn ScriptRuntime)> = Some((&*sandbox, runtime.as_ref()));
    let mut builder = TreeBuilder::new(sandbox.body(), page.location().clone());
    let mut fetch_error = None;

    let mut body: ByteStream = match source {
        FragmentSource::Markup(markup) => stream::once(async move { Ok::<_, FetchError>(Bytes::from(markup)) }).boxed_local(),
        FragmentSource::Url(url) => {
            tracing::debug!(url = %url, "Fetching fragment");
            let request = FetchRequest {
                url,
                cookie: page.cookies().borrow().header_value(),
            };
            match page.fetcher().fetch(request).await {
                Ok(body) => body,
                Err(e) => {
                    let message = format!("Failed to load fragment: {e}");
                    tracing::warn!(error = %e, "Fragment fetch failed");
                    builder.append_text(&mut page.dom().borrow_mut(), &message);
                    fetch_error = Some(message);
                    stream::empty::<Result<Bytes, FetchError>>().boxed_local()
                }
            }
        }
    };

    let mut decoder = Utf8Decoder::default();
    while let Some(chunk) = body.next().await {
        let mut dom = page.dom().borrow_mut();
        match chunk {
            Ok(bytes) => {
                let text = decoder.decode(&bytes);
                builder.feed(&mut dom, ctx, &text);
            }
            Err(e) => {
                let message = format!("Failed to load fragment: {e}");
                tracing::warn!(error = %e, "Fragment stream failed");
                builder.append_text(&mut dom, &message);
                fetch_error = Some(message);
                break;
            }
        }
    }

    {
        let mut dom = page.dom().borrow_mut();
        let tail = decoder.finish();
        builder.feed(&mut dom, ctx, &tail);
        builder.finish(&mut dom, ctx);
        sandbox.transfer(&mut dom);
    }

    Ok(Reframed {
        container,
        scripts_executed: builder.scripts_executed(),
        sandbox,
        fetch_error,
    })
}

/// Incremental UTF-8 decoder; invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of `pending + bytes` as forms complete characters.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut input = std::mem::take(&mut self.pending);
        let mut start = 0;

        loop {
            match std::str::from_utf8(&input[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&input[start..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            input.drain(..valid_end);
                            self.pending = input;
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush a trailing incomplete sequence.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned()
    }
}
