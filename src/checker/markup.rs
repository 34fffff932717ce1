// src/checker/markup.rs
// =============================================================================
// A small tokenizer for Confluence "storage format" markup.
//
// This is NOT an HTML parser. It only splits the document into tags, text
// and comments and remembers the byte range of every token, so that:
// - the link extractor can walk table cells token by token
// - the status rewriter can replace one tag without touching anything else
//
// Storage format uses namespaced tags like <ac:emoticon ac:name="tick" />,
// so tag names may contain ':'.
//
// Malformed input never fails: an unterminated tag or comment simply ends
// the token stream.
// =============================================================================

use std::ops::Range;

/// What kind of markup a token is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// <td>, <a href="...">, <ac:emoticon ... />
    StartTag { name: String, self_closing: bool },
    /// </td>
    EndTag { name: String },
    /// Anything between tags
    Text,
    /// <!-- ... -->, <![CDATA[ ... ]]>, <!DOCTYPE ...>, <? ... ?>
    Comment,
}

/// One token plus the byte range it covers in the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    /// True for a start (or self-closing) tag with the given name
    pub fn is_start(&self, tag: &str) -> bool {
        matches!(&self.kind, TokenKind::StartTag { name, .. } if name == tag)
    }

    /// True for an end tag with the given name
    pub fn is_end(&self, tag: &str) -> bool {
        matches!(&self.kind, TokenKind::EndTag { name } if name == tag)
    }

    /// The exact source bytes of this token
    pub fn raw<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }

    /// Decoded text for text tokens, None for everything else
    pub fn text(&self, source: &str) -> Option<String> {
        match self.kind {
            TokenKind::Text => Some(decode_entities(self.raw(source))),
            _ => None,
        }
    }
}

/// Iterator over the tokens of a document
///
/// Example:
///   "<td><a>/foo</a></td>" yields
///   StartTag(td), StartTag(a), Text("/foo"), EndTag(a), EndTag(td)
pub struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            done: false,
        }
    }

    // Text runs until the next '<' that actually starts markup.
    // A lone '<' (as in "a < b") stays part of the text.
    fn text_token(&self, start: usize) -> Token {
        let bytes = self.source.as_bytes();
        let mut end = start + 1;
        while end < bytes.len() && !starts_markup(bytes, end) {
            end += 1;
        }
        Token {
            kind: TokenKind::Text,
            span: start..end,
        }
    }

    fn markup_token(&self, start: usize) -> Option<Token> {
        let rest = &self.source[start..];

        if rest.starts_with("<!--") {
            return comment_until(rest, start, 4, "-->");
        }
        if rest.starts_with("<![CDATA[") {
            return comment_until(rest, start, 9, "]]>");
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            return comment_until(rest, start, 2, ">");
        }

        if let Some(after_slash) = rest.strip_prefix("</") {
            // "</" followed by something other than a letter is a bogus comment
            if !after_slash.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return comment_until(rest, start, 2, ">");
            }
            let close = rest.find('>')?;
            let name = tag_name(&rest[2..close]);
            return Some(Token {
                kind: TokenKind::EndTag { name },
                span: start..start + close + 1,
            });
        }

        let close = find_tag_end(rest)?;
        let name = tag_name(&rest[1..close]);
        let self_closing = rest[..close].ends_with('/');
        Some(Token {
            kind: TokenKind::StartTag { name, self_closing },
            span: start..start + close + 1,
        })
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done || self.pos >= self.source.len() {
            return None;
        }

        let start = self.pos;
        let token = if starts_markup(self.source.as_bytes(), start) {
            self.markup_token(start)
        } else {
            Some(self.text_token(start))
        };

        match token {
            Some(token) => {
                self.pos = token.span.end;
                Some(token)
            }
            None => {
                // Unterminated markup: nothing after this point is trustworthy
                self.done = true;
                None
            }
        }
    }
}

// Does the byte at `at` open a tag, end tag, comment or directive?
fn starts_markup(bytes: &[u8], at: usize) -> bool {
    bytes.get(at) == Some(&b'<')
        && matches!(bytes.get(at + 1), Some(&b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

fn comment_until(rest: &str, start: usize, skip: usize, terminator: &str) -> Option<Token> {
    let end = rest[skip..].find(terminator)? + skip + terminator.len();
    Some(Token {
        kind: TokenKind::Comment,
        span: start..start + end,
    })
}

// Finds the '>' that closes a start tag, ignoring any '>' inside quoted
// attribute values. A quote only opens a value right after '=' (spaces
// allowed), so an apostrophe in an unquoted value like title=don't is
// just a character. Returns the byte offset within `rest`.
fn find_tag_end(rest: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut after_equals = false;
    for (i, b) in rest.bytes().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'>' => return Some(i),
            None if after_equals && (b == b'"' || b == b'\'') => {
                quote = Some(b);
                after_equals = false;
            }
            None if b == b'=' => after_equals = true,
            None if b.is_ascii_whitespace() => {}
            None => after_equals = false,
        }
    }
    None
}

fn tag_name(inner: &str) -> String {
    inner
        .split(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Decodes the handful of entities Confluence emits inside link text
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    // &amp; goes last so "&amp;lt;" becomes "&lt;" and not "<"
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
