//! Tree builder feeding tokenized markup into the arena DOM.
//!
//! # Design Decisions
//! - Reuses the streaming tokenizer from the gateway's HTML rewriter
//! - Forgiving like a browser: `html`/`head`/`body` tags are dropped (their
//!   content lands in the root), stray end tags are ignored, unclosed
//!   elements are closed at end of input
//! - Classic scripts run when their end tag is parsed, so they observe
//!   exactly the nodes before them; everything else waits for `finish`

use url::Url;

use crate::html::tokenizer::{StartTag, Token, Tokenizer};
use crate::piercing::dom::{Dom, NodeId, VOID_ELEMENTS};
use crate::piercing::sandbox::Sandbox;
use crate::piercing::script::{Script, ScriptKind, ScriptRuntime, ScriptScope};

/// Structural tags dropped by the builder; their children are kept.
const IMPLIED_TAGS: &[&str] = &["html", "head", "body"];

/// Elements whose text content is taken literally.
const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes",
];

/// Incremental tree builder.
#[derive(Debug)]
pub struct TreeBuilder {
    tokenizer: Tokenizer,
    open: Vec<NodeId>,
    text: String,
    base: Url,
    execute: bool,
    queued: Vec<Script>,
    executed: usize,
}

impl TreeBuilder {
    /// Builder that executes scripts relative to `base`.
    pub fn new(root: NodeId, base: Url) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            open: vec![root],
            text: String::new(),
            base,
            execute: true,
            queued: Vec::new(),
            executed: 0,
        }
    }

    /// Builder that never runs scripts (markup already rendered by a server).
    pub fn inert(root: NodeId, base: Url) -> Self {
        Self {
            execute: false,
            ..Self::new(root, base)
        }
    }

    /// Number of scripts run so far.
    pub fn scripts_executed(&self) -> usize {
        self.executed
    }

    /// Parse the next chunk of decoded markup.
    pub fn feed(&mut self, dom: &mut Dom, ctx: Option<(&Sandbox, &dyn ScriptRuntime)>, chunk: &str) {
        for token in self.tokenizer.feed(chunk.as_bytes()) {
            self.process(dom, ctx, token);
        }
    }

    /// Append literal text at the current insertion point.
    pub fn append_text(&mut self, dom: &mut Dom, text: &str) {
        self.flush_text(dom);
        let node = dom.create_text(text);
        dom.append_child(self.current(), node);
    }

    /// Flush the tokenizer, close open elements and run the scripts that
    /// were waiting for the end of parsing.
    pub fn finish(&mut self, dom: &mut Dom, ctx: Option<(&Sandbox, &dyn ScriptRuntime)>) {
        for token in self.tokenizer.finish() {
            self.process(dom, ctx, token);
        }
        self.flush_text(dom);
        self.open.truncate(1);

        let queued = std::mem::take(&mut self.queued);
        let (async_scripts, deferred): (Vec<_>, Vec<_>) =
            queued.into_iter().partition(|s| s.kind == ScriptKind::Async);
        for script in async_scripts.iter().chain(&deferred) {
            self.run(dom, ctx, script);
        }
    }

    fn current(&self) -> NodeId {
        // the root is never popped
        self.open[self.open.len() - 1]
    }

    fn in_raw_text(&self, dom: &Dom) -> bool {
        self.open.len() > 1 && dom.tag(self.current()).is_some_and(|t| RAW_TEXT_TAGS.contains(&t))
    }

    /// Text is buffered raw until the next tag so that character references
    /// split across chunks still decode.
    fn flush_text(&mut self, dom: &mut Dom) {
        if self.text.is_empty() {
            return;
        }
        let raw = std::mem::take(&mut self.text);
        let content = if self.in_raw_text(dom) {
            raw
        } else {
            decode_entities(&raw)
        };
        let text = dom.create_text(content);
        dom.append_child(self.current(), text);
    }

    fn process(&mut self, dom: &mut Dom, ctx: Option<(&Sandbox, &dyn ScriptRuntime)>, token: Token) {
        match token {
            Token::Text(raw) => self.text.push_str(&String::from_utf8_lossy(&raw)),
            Token::Comment(raw) => {
                self.flush_text(dom);
                let raw = String::from_utf8_lossy(&raw);
                let body = raw
                    .strip_prefix("<!--")
                    .and_then(|r| r.strip_suffix("-->"))
                    .unwrap_or(&raw);
                let comment = dom.create_comment(body);
                dom.append_child(self.current(), comment);
            }
            Token::Declaration(_) => {}
            Token::StartTag(tag) => {
                self.flush_text(dom);
                if IMPLIED_TAGS.contains(&tag.name.as_str()) {
                    return;
                }
                let element = create_element(dom, &tag);
                dom.append_child(self.current(), element);
                if !tag.self_closing && !VOID_ELEMENTS.contains(&tag.name.as_str()) {
                    self.open.push(element);
                }
            }
            Token::EndTag(tag) => {
                self.flush_text(dom);
                if IMPLIED_TAGS.contains(&tag.name.as_str()) {
                    return;
                }
                let Some(depth) = self
                    .open
                    .iter()
                    .skip(1)
                    .rposition(|n| dom.tag(*n) == Some(tag.name.as_str()))
                else {
                    return;
                };
                let element = self.open[depth + 1];
                self.open.truncate(depth + 1);
                if tag.name == "script" {
                    self.script_parsed(dom, ctx, element);
                }
            }
        }
    }

    fn script_parsed(&mut self, dom: &mut Dom, ctx: Option<(&Sandbox, &dyn ScriptRuntime)>, node: NodeId) {
        if !self.execute {
            return;
        }
        let src = dom.attribute(node, "src");
        let Some(kind) = ScriptKind::classify(
            dom.attribute(node, "type"),
            src.is_some(),
            dom.attribute(node, "defer").is_some(),
            dom.attribute(node, "async").is_some(),
        ) else {
            return;
        };
        let src = match src.map(|s| self.base.join(s)) {
            Some(Ok(url)) => Some(url),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Skipping script with invalid src");
                return;
            }
            None => None,
        };

        let script = Script {
            node,
            kind,
            src,
            text: dom.text_content(node),
        };
        if kind == ScriptKind::Classic {
            self.run(dom, ctx, &script);
        } else {
            self.queued.push(script);
        }
    }

    fn run(&mut self, dom: &mut Dom, ctx: Option<(&Sandbox, &dyn ScriptRuntime)>, script: &Script) {
        let Some((sandbox, runtime)) = ctx else {
            return;
        };
        let mut scope = ScriptScope::new(dom, sandbox, script.node);
        if let Err(e) = runtime.execute(script, &mut scope) {
            tracing::warn!(error = %e, kind = ?script.kind, "Fragment script failed");
        }
        self.executed += 1;
    }
}

fn create_element(dom: &mut Dom, tag: &StartTag) -> NodeId {
    let element = dom.create_element(&tag.name);
    for attribute in &tag.attributes {
        let value = attribute
            .value
            .as_deref()
            .map(decode_entities)
            .unwrap_or_default();
        if dom.attribute(element, &attribute.name).is_none() {
            dom.set_attribute(element, &attribute.name, value);
        }
    }
    element
}

/// Decode the character references that matter for fragment markup.
/// Unknown references are kept verbatim.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let name = &rest[1..end];
            let c = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piercing::script::ScriptError;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn base() -> Url {
        Url::parse("http://shell.local/").unwrap()
    }

    fn parse(markup: &str) -> (Dom, NodeId) {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let mut builder = TreeBuilder::inert(root, base());
        builder.feed(&mut dom, None, markup);
        builder.finish(&mut dom, None);
        (dom, root)
    }

    #[test]
    fn test_builds_tree() {
        let (dom, root) = parse(
            "<!DOCTYPE html><html><head><title>T</title></head><body><p class=a>x &amp; y<br>z</p><!-- c --></body></html>",
        );
        assert_eq!(
            dom.inner_html(root),
            "<title>T</title><p class=\"a\">x &amp; y<br>z</p><!-- c -->"
        );
    }

    #[test]
    fn test_stray_and_unclosed_tags() {
        let (dom, root) = parse("<div><span>a</div>b</em><p>c");
        assert_eq!(dom.inner_html(root), "<div><span>a</span></div>b<p>c</p>");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#39;c&#x27; &copy;"), "a <b> 'c' &copy;");
        assert_eq!(decode_entities("&&amp"), "&&amp");
    }

    #[test]
    fn test_classic_script_sees_preceding_nodes() {
        let mut dom = Dom::new();
        let container = dom.create_element("div");
        let sandbox = Sandbox::create(&mut dom, container, base()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let runtime = move |script: &Script, scope: &mut ScriptScope<'_>| -> Result<(), ScriptError> {
            let body = scope.body();
            log.borrow_mut()
                .push((script.text.clone(), scope.dom().children(body).len()));
            Ok(())
        };

        let mut builder = TreeBuilder::new(sandbox.body(), base());
        let ctx: Option<(&Sandbox, &dyn ScriptRuntime)> = Some((&sandbox, &runtime));
        builder.feed(&mut dom, ctx, "<p>1</p><script>if (a < b) one()</script><p>2</p>");
        builder.feed(&mut dom, ctx, "<script>two()</script>");
        builder.finish(&mut dom, ctx);

        assert_eq!(
            *seen.borrow(),
            vec![
                ("if (a < b) one()".to_string(), 2),
                ("two()".to_string(), 4)
            ]
        );
        assert_eq!(builder.scripts_executed(), 2);
    }
}
