//! Incremental HTML tokenizer.
//!
//! # Responsibilities
//! - Split an arbitrarily chunked byte stream into markup tokens
//! - Keep the exact source bytes of every token (`raw`)
//! - Track raw-text elements (`script`, `style`, ...) so their content is
//!   never mistaken for markup
//!
//! # Design Decisions
//! - Push-based: callers feed chunks and receive completed tokens
//! - At most one unterminated construct is buffered between feeds
//! - Never fails: anything unterminated at end of input becomes text
//! - Not a complete HTML5 tokenizer; entities and attribute values are
//!   left undecoded for callers that need the original bytes

use bytes::{Bytes, BytesMut};
use std::ops::Range;

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes",
];

/// A single attribute of a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    /// Raw (undecoded) value, `None` for valueless attributes.
    pub value: Option<String>,
    /// Byte range of the whole attribute within the tag's raw bytes.
    pub span: Range<usize>,
    /// Byte range of the value within the tag's raw bytes, quotes excluded.
    pub value_span: Option<Range<usize>>,
    /// Whether the value was quoted.
    pub quoted: bool,
}

/// A parsed start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub raw: Bytes,
    /// Lowercased tag name.
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
    /// Offset just past the tag name within `raw`.
    pub name_end: usize,
}

impl StartTag {
    /// Look up an attribute value by (lowercase) name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    /// Look up the full attribute entry by (lowercase) name.
    pub fn attribute_entry(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A parsed end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTag {
    pub raw: Bytes,
    pub name: String,
}

/// One markup token, carrying its original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(Bytes),
    StartTag(StartTag),
    EndTag(EndTag),
    Comment(Bytes),
    /// `<!DOCTYPE ...>`, `<?...>` and other `<!` declarations.
    Declaration(Bytes),
}

impl Token {
    /// The exact bytes this token was produced from.
    pub fn raw(&self) -> &Bytes {
        match self {
            Token::Text(raw) | Token::Comment(raw) | Token::Declaration(raw) => raw,
            Token::StartTag(tag) => &tag.raw,
            Token::EndTag(tag) => &tag.raw,
        }
    }
}

enum Kind {
    Text,
    StartTag,
    EndTag,
    Comment,
    Declaration,
}

enum Step {
    Emit(usize, Kind),
    NeedMore,
}

/// Push tokenizer over a byte stream.
#[derive(Debug, Default)]
pub struct Tokenizer {
    buf: BytesMut,
    raw_text: Option<String>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and return every token it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Token> {
        self.buf.extend_from_slice(chunk);
        self.drain(false)
    }

    /// Signal end of input, flushing anything still buffered.
    pub fn finish(&mut self) -> Vec<Token> {
        self.drain(true)
    }

    /// Number of bytes held back waiting for a construct to complete.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn drain(&mut self, eof: bool) -> Vec<Token> {
        let mut tokens = Vec::new();

        while !self.buf.is_empty() {
            let step = match &self.raw_text {
                Some(name) => scan_raw_text(&self.buf, name),
                None => scan_markup(&self.buf),
            };

            let (len, kind) = match step {
                Step::Emit(len, kind) => (len, kind),
                Step::NeedMore => break,
            };

            let raw = self.buf.split_to(len).freeze();
            let token = match kind {
                Kind::Text => Token::Text(raw),
                Kind::Comment => Token::Comment(raw),
                Kind::Declaration => Token::Declaration(raw),
                Kind::EndTag => {
                    self.raw_text = None;
                    Token::EndTag(parse_end_tag(raw))
                }
                Kind::StartTag => {
                    let tag = parse_start_tag(raw);
                    if !tag.self_closing && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                        self.raw_text = Some(tag.name.clone());
                    }
                    Token::StartTag(tag)
                }
            };
            tokens.push(token);
        }

        if eof && !self.buf.is_empty() {
            tokens.push(Token::Text(self.buf.split().freeze()));
        }

        tokens
    }
}

fn find(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|b| *b == needle)
}

fn find_seq(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn scan_markup(buf: &[u8]) -> Step {
    if buf[0] != b'<' {
        let len = find(buf, b'<').unwrap_or(buf.len());
        return Step::Emit(len, Kind::Text);
    }
    if buf.len() < 2 {
        return Step::NeedMore;
    }

    match buf[1] {
        b'!' => {
            const OPEN: &[u8] = b"<!--";
            if buf.len() < OPEN.len() && OPEN.starts_with(buf) {
                return Step::NeedMore;
            }
            if buf.starts_with(OPEN) {
                return match find_seq(&buf[2..], b"-->") {
                    Some(pos) => Step::Emit(2 + pos + 3, Kind::Comment),
                    None => Step::NeedMore,
                };
            }
            match find(buf, b'>') {
                Some(pos) => Step::Emit(pos + 1, Kind::Declaration),
                None => Step::NeedMore,
            }
        }
        b'?' => match find(buf, b'>') {
            Some(pos) => Step::Emit(pos + 1, Kind::Declaration),
            None => Step::NeedMore,
        },
        b'/' => {
            if buf.len() < 3 {
                return Step::NeedMore;
            }
            if buf[2].is_ascii_alphabetic() {
                match find(buf, b'>') {
                    Some(pos) => Step::Emit(pos + 1, Kind::EndTag),
                    None => Step::NeedMore,
                }
            } else if buf[2] == b'>' {
                Step::Emit(3, Kind::Text)
            } else {
                match find(buf, b'>') {
                    Some(pos) => Step::Emit(pos + 1, Kind::Comment),
                    None => Step::NeedMore,
                }
            }
        }
        b if b.is_ascii_alphabetic() => match find_tag_end(buf) {
            Some(end) => Step::Emit(end, Kind::StartTag),
            None => Step::NeedMore,
        },
        _ => Step::Emit(1, Kind::Text),
    }
}

/// Find the end (exclusive) of a start tag, honoring quoted attribute values.
fn find_tag_end(buf: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut after_eq = false;

    for (i, &b) in buf.iter().enumerate().skip(1) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'>' => return Some(i + 1),
                b'=' => after_eq = true,
                b'"' | b'\'' if after_eq => {
                    quote = Some(b);
                    after_eq = false;
                }
                b if b.is_ascii_whitespace() => {}
                _ => after_eq = false,
            },
        }
    }
    None
}

fn scan_raw_text(buf: &[u8], name: &str) -> Step {
    let name = name.as_bytes();
    let needed = 2 + name.len() + 1;
    let mut from = 0;

    while let Some(pos) = find(&buf[from..], b'<') {
        let at = from + pos;
        let rest = &buf[at..];

        if rest.len() < needed {
            if is_partial_end_tag(rest, name) {
                return if at > 0 {
                    Step::Emit(at, Kind::Text)
                } else {
                    Step::NeedMore
                };
            }
            from = at + 1;
            continue;
        }

        let boundary = rest[2 + name.len()];
        if rest[1] == b'/'
            && rest[2..2 + name.len()].eq_ignore_ascii_case(name)
            && (boundary.is_ascii_whitespace() || boundary == b'/' || boundary == b'>')
        {
            if at > 0 {
                return Step::Emit(at, Kind::Text);
            }
            return match find(rest, b'>') {
                Some(end) => Step::Emit(end + 1, Kind::EndTag),
                None => Step::NeedMore,
            };
        }
        from = at + 1;
    }

    Step::Emit(buf.len(), Kind::Text)
}

/// Whether `rest` (shorter than a full `</name>` probe) could still become the end tag.
fn is_partial_end_tag(rest: &[u8], name: &[u8]) -> bool {
    if rest.len() >= 2 && rest[1] != b'/' {
        return false;
    }
    let typed = rest.get(2..).unwrap_or_default();
    typed.len() <= name.len() && typed.eq_ignore_ascii_case(&name[..typed.len()])
}

fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'/' || b == b'>'
}

fn parse_end_tag(raw: Bytes) -> EndTag {
    let name_bytes: Vec<u8> = raw[2..]
        .iter()
        .copied()
        .take_while(|b| !is_name_end(*b))
        .collect();
    EndTag {
        name: String::from_utf8_lossy(&name_bytes).to_ascii_lowercase(),
        raw,
    }
}

fn parse_start_tag(raw: Bytes) -> StartTag {
    // raw is `<name ...>`; the final byte is always `>`
    let body_end = raw.len() - 1;
    let mut i = 1;
    while i < body_end && !is_name_end(raw[i]) {
        i += 1;
    }
    let name = String::from_utf8_lossy(&raw[1..i]).to_ascii_lowercase();
    let name_end = i;

    let mut attributes = Vec::new();
    loop {
        while i < body_end && (raw[i].is_ascii_whitespace() || raw[i] == b'/') {
            i += 1;
        }
        if i >= body_end {
            break;
        }

        let start = i;
        while i < body_end && !raw[i].is_ascii_whitespace() && raw[i] != b'=' && raw[i] != b'/'
        {
            i += 1;
        }
        // a stray `=` with no name still has to make progress
        if i == start {
            i += 1;
            continue;
        }
        let attr_name = String::from_utf8_lossy(&raw[start..i]).to_ascii_lowercase();

        let mut j = i;
        while j < body_end && raw[j].is_ascii_whitespace() {
            j += 1;
        }

        if j < body_end && raw[j] == b'=' {
            j += 1;
            while j < body_end && raw[j].is_ascii_whitespace() {
                j += 1;
            }
            let (value_span, quoted, next) = if j < body_end && (raw[j] == b'"' || raw[j] == b'\'')
            {
                let quote = raw[j];
                let value_start = j + 1;
                let value_end = raw[value_start..body_end]
                    .iter()
                    .position(|b| *b == quote)
                    .map(|p| value_start + p)
                    .unwrap_or(body_end);
                (value_start..value_end, true, (value_end + 1).min(body_end))
            } else {
                let value_start = j;
                let mut value_end = j;
                while value_end < body_end && !raw[value_end].is_ascii_whitespace() {
                    value_end += 1;
                }
                (value_start..value_end, false, value_end)
            };

            attributes.push(Attribute {
                name: attr_name,
                value: Some(String::from_utf8_lossy(&raw[value_span.clone()]).into_owned()),
                span: start..next,
                value_span: Some(value_span),
                quoted,
            });
            i = next;
        } else {
            attributes.push(Attribute {
                name: attr_name,
                value: None,
                span: start..i,
                value_span: None,
                quoted: false,
            });
        }
    }

    let self_closing = body_end > name_end && raw[body_end - 1] == b'/';

    StartTag {
        raw,
        name,
        attributes,
        self_closing,
        name_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new();
        let mut tokens = tokenizer.feed(input.as_bytes());
        tokens.extend(tokenizer.finish());
        tokens
    }

    fn concat(tokens: &[Token]) -> Vec<u8> {
        tokens.iter().flat_map(|t| t.raw().to_vec()).collect()
    }

    #[test]
    fn test_start_tag_attributes() {
        let tokens = tokenize(r#"<div id="a" class='b c' hidden data-x=1>"#);
        let Token::StartTag(tag) = &tokens[0] else {
            panic!("expected start tag, got {:?}", tokens[0]);
        };
        assert_eq!(tag.name, "div");
        assert_eq!(tag.attribute("id"), Some("a"));
        assert_eq!(tag.attribute("class"), Some("b c"));
        assert_eq!(tag.attribute("hidden"), Some(""));
        assert_eq!(tag.attribute("data-x"), Some("1"));
        assert!(!tag.self_closing);
        assert_eq!(tag.name_end, 4);
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        let tokens = tokenize(r#"<a title="x>y">t</a>"#);
        let Token::StartTag(tag) = &tokens[0] else {
            panic!("expected start tag");
        };
        assert_eq!(tag.attribute("title"), Some("x>y"));
        assert_eq!(tokens[1], Token::Text(Bytes::from_static(b"t")));
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let tokens = tokenize("<script>if (a < b) { x = '<head>'; }</script><p>");
        assert!(matches!(&tokens[0], Token::StartTag(t) if t.name == "script"));
        assert_eq!(
            concat(&tokens[1..tokens.len() - 2]),
            b"if (a < b) { x = '<head>'; }".to_vec()
        );
        assert!(matches!(&tokens[tokens.len() - 2], Token::EndTag(t) if t.name == "script"));
        assert!(matches!(&tokens[tokens.len() - 1], Token::StartTag(t) if t.name == "p"));
    }

    #[test]
    fn test_end_tag_split_across_chunks() {
        let mut tokenizer = Tokenizer::new();
        let mut tokens = tokenizer.feed(b"<script>let a = 1;</scr");
        assert_eq!(tokenizer.buffered(), 5);
        tokens.extend(tokenizer.feed(b"ipt>done"));
        tokens.extend(tokenizer.finish());
        assert!(tokens.iter().any(|t| matches!(t, Token::EndTag(e) if e.name == "script")));
        assert_eq!(tokens.last(), Some(&Token::Text(Bytes::from_static(b"done"))));
    }

    #[test]
    fn test_comments_and_declarations() {
        let tokens = tokenize("<!DOCTYPE html><!-- <head> --><?xml?>");
        assert!(matches!(&tokens[0], Token::Declaration(_)));
        assert_eq!(tokens[1], Token::Comment(Bytes::from_static(b"<!-- <head> -->")));
        assert!(matches!(&tokens[2], Token::Declaration(_)));
    }

    #[test]
    fn test_unterminated_tag_flushed_as_text() {
        let input = "<p>ok</p><div class=\"never";
        let tokens = tokenize(input);
        assert_eq!(concat(&tokens), input.as_bytes());
        assert!(matches!(tokens.last(), Some(Token::Text(_))));
    }

    #[test]
    fn test_stray_angle_brackets() {
        let input = "a < b </> c <3";
        let tokens = tokenize(input);
        assert_eq!(concat(&tokens), input.as_bytes());
        assert!(tokens.iter().all(|t| matches!(t, Token::Text(_))));
    }

    #[test]
    fn test_self_closing_and_unquoted_values() {
        let tokens = tokenize("<img src=/a.png alt=don't />");
        let Token::StartTag(tag) = &tokens[0] else {
            panic!("expected start tag");
        };
        assert!(tag.self_closing);
        assert_eq!(tag.attribute("src"), Some("/a.png"));
        assert_eq!(tag.attribute("alt"), Some("don't"));
    }
}
