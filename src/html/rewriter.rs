//! Streaming shell document rewriter.
//!
//! # Responsibilities
//! - Inject the pre-piercing style block once per document
//! - Decorate pre-rendered piercing hosts with their pre-piercing classes
//! - Pass every other byte through unchanged
//!
//! # State Machine
//! ```text
//! BeforeHead ──<head>──▶ InHead ──</head>──▶ AfterHeadInjected ──<body>──▶ Body
//!     │  │                                          ▲                    ▲
//!     │  └──outlet/host (styles injected before it)─┘                    │
//!     └──────────────<body> (styles injected before it)──────────────────┘
//! ```
//!
//! A document with neither `<head>` nor `<body>` still gets its styles, in
//! front of the first piercing element.
//!
//! # Design Decisions
//! - Works on tokens, not a DOM: memory is bounded by one in-flight construct
//! - Output is identical no matter how the input is chunked
//! - Malformed markup is never an error; it is passed through verbatim

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;

use crate::html::tokenizer::{StartTag, Token, Tokenizer};
use crate::html::{FRAGMENT_ID_ATTRIBUTE, HOST_TAG, OUTLET_TAG};
use crate::routing::FragmentRegistry;

/// Immutable, process-wide rewrite instructions shared by every request.
#[derive(Debug, Clone, Default)]
pub struct RewriteSettings {
    pre_piercing_styles: Bytes,
    host_class_names: HashMap<String, String>,
}

impl RewriteSettings {
    /// Build settings from the configured style block and the registry's
    /// per-fragment class names.
    pub fn new(pre_piercing_styles: impl Into<String>, registry: &FragmentRegistry) -> Self {
        let host_class_names = registry
            .iter()
            .filter(|f| !f.pre_piercing_class_names.is_empty())
            .map(|f| (f.fragment_id.clone(), f.pre_piercing_class_names.join(" ")))
            .collect();

        Self {
            pre_piercing_styles: Bytes::from(pre_piercing_styles.into()),
            host_class_names,
        }
    }

    /// Style block injected into every document.
    pub fn pre_piercing_styles(&self) -> &[u8] {
        &self.pre_piercing_styles
    }
}

/// Where the rewriter is within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// Nothing injected yet.
    BeforeHead,
    /// Inside `<head>`; styles already injected.
    InHead,
    /// `</head>` seen.
    AfterHeadInjected,
    /// Inside `<body>`.
    Body,
}

/// One-shot rewriter for a single response body.
#[derive(Debug)]
pub struct HtmlRewriter {
    tokenizer: Tokenizer,
    state: DocumentState,
    settings: Arc<RewriteSettings>,
    finished: bool,
}

impl HtmlRewriter {
    pub fn new(settings: Arc<RewriteSettings>) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            state: DocumentState::BeforeHead,
            settings,
            finished: false,
        }
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// Rewrite the next input chunk. May return an empty buffer when the
    /// chunk only extended an unterminated construct.
    pub fn write(&mut self, chunk: &[u8]) -> Bytes {
        let tokens = self.tokenizer.feed(chunk);
        self.render(tokens)
    }

    /// Flush whatever is still buffered. Subsequent calls return nothing.
    pub fn end(&mut self) -> Bytes {
        if self.finished {
            return Bytes::new();
        }
        self.finished = true;
        let tokens = self.tokenizer.finish();
        self.render(tokens)
    }

    fn render(&mut self, tokens: Vec<Token>) -> Bytes {
        let mut out = BytesMut::new();
        for token in tokens {
            self.apply(token, &mut out);
        }
        out.freeze()
    }

    fn apply(&mut self, token: Token, out: &mut BytesMut) {
        if let Token::StartTag(tag) = &token {
            if self.state == DocumentState::BeforeHead
                && (tag.name == OUTLET_TAG || tag.name == HOST_TAG)
            {
                out.extend_from_slice(self.settings.pre_piercing_styles());
                self.state = DocumentState::AfterHeadInjected;
            }
        }

        match &token {
            Token::StartTag(tag) if tag.name == "head" => {
                out.extend_from_slice(&tag.raw);
                if self.state == DocumentState::BeforeHead {
                    out.extend_from_slice(self.settings.pre_piercing_styles());
                    self.state = DocumentState::InHead;
                }
                return;
            }
            Token::StartTag(tag) if tag.name == "body" => {
                if self.state == DocumentState::BeforeHead {
                    out.extend_from_slice(self.settings.pre_piercing_styles());
                }
                self.state = DocumentState::Body;
            }
            Token::EndTag(tag) if tag.name == "head" => {
                if self.state == DocumentState::InHead {
                    self.state = DocumentState::AfterHeadInjected;
                }
            }
            Token::StartTag(tag) if tag.name == HOST_TAG => {
                let classes = tag
                    .attribute(FRAGMENT_ID_ATTRIBUTE)
                    .and_then(|id| self.settings.host_class_names.get(id));
                if let Some(classes) = classes {
                    out.extend_from_slice(&add_class_names(tag, classes));
                    return;
                }
            }
            _ => {}
        }
        out.extend_from_slice(token.raw());
    }
}

/// Re-emit `tag` with `classes` merged into its `class` attribute, touching
/// no other bytes.
fn add_class_names(tag: &StartTag, classes: &str) -> Vec<u8> {
    let raw = &tag.raw[..];
    let mut out = Vec::with_capacity(raw.len() + classes.len() + 10);

    match tag.attribute_entry("class") {
        Some(attr) => match &attr.value_span {
            Some(span) => {
                let existing = &raw[span.clone()];
                out.extend_from_slice(&raw[..span.start]);
                if !attr.quoted {
                    out.push(b'"');
                }
                out.extend_from_slice(existing);
                if !existing.iter().all(|b| b.is_ascii_whitespace()) {
                    out.push(b' ');
                }
                out.extend_from_slice(classes.as_bytes());
                if !attr.quoted {
                    out.push(b'"');
                }
                out.extend_from_slice(&raw[span.end..]);
            }
            None => {
                out.extend_from_slice(&raw[..attr.span.end]);
                out.extend_from_slice(format!("=\"{classes}\"").as_bytes());
                out.extend_from_slice(&raw[attr.span.end..]);
            }
        },
        None => {
            out.extend_from_slice(&raw[..tag.name_end]);
            out.extend_from_slice(format!(" class=\"{classes}\"").as_bytes());
            out.extend_from_slice(&raw[tag.name_end..]);
        }
    }
    out
}
