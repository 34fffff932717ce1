// src/checker/rewrite.rs
// =============================================================================
// This module writes validation results back into the page.
//
// Every link row carries a status icon:
//   <ac:emoticon ac:name="tick" />   or   <ac:emoticon ac:name="cross" />
//
// We walk the original document once, front to back. When we reach a link
// we open a "scope" for its result; the first emoticon tag after that gets
// "cross" -> "tick" (success) or "tick" -> "cross" (failure), and the scope
// closes. Every other byte of the document is copied unchanged.
//
// Two ways of deciding which link a scope belongs to:
// - Row:       the link's position in the table (same rules as extraction)
// - Substring: any '>'-terminated chunk that contains the link text
//              (the old behaviour; short links can match longer ones)
// =============================================================================

use std::borrow::Cow;
use std::collections::HashMap;

use clap::ValueEnum;
use log::{debug, warn};

use super::html::extract_table_links;
use super::http::ValidationResult;
use super::markup::{Token, Tokenizer};

/// Tag that renders the status icon
const GLYPH_TAG: &str = "ac:emoticon";

/// How a link is tied to the status icon that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MatchMode {
    /// Tie each result to its own table cell
    #[default]
    Row,
    /// Open a scope wherever the link text appears
    Substring,
}

/// Rewrites the status icons of `original` according to `results`
///
/// Pure: the input is not modified and nothing but the returned string is
/// produced. Rewriting an already rewritten document with the same results
/// returns it unchanged.
pub fn rewrite_statuses(original: &str, results: &[ValidationResult], mode: MatchMode) -> String {
    match mode {
        MatchMode::Row => rewrite_by_row(original, results),
        MatchMode::Substring => rewrite_by_substring(original, results),
    }
}

fn rewrite_by_row(original: &str, results: &[ValidationResult]) -> String {
    let by_index: HashMap<usize, &ValidationResult> =
        results.iter().map(|result| (result.index, result)).collect();

    let mut links = extract_table_links(original).peekable();
    let mut scope: Option<&ValidationResult> = None;
    let mut output = String::with_capacity(original.len());
    let mut copied = 0;

    for token in Tokenizer::new(original) {
        // Links are found in the same token stream, so a link "starts" at
        // the text token that holds it.
        while let Some(link) = links.next_if(|link| link.span.start <= token.span.start) {
            if let Some(open) = scope.take() {
                warn!("No status icon found for {} before the next link", open.url);
            }
            match by_index.get(&link.index) {
                Some(result) if result.url == link.url => scope = Some(*result),
                Some(result) => warn!(
                    "Result #{} is for {} but the document has {} there, skipping",
                    link.index, result.url, link.url
                ),
                None => debug!("No result for link #{} ({})", link.index, link.url),
            }
        }

        if token.is_end("tr") {
            if let Some(open) = scope.take() {
                warn!("No status icon found in the row of {}", open.url);
            }
            continue;
        }

        if !is_glyph(&token) {
            continue;
        }
        if let Some(owner) = scope.take() {
            output.push_str(&original[copied..token.span.start]);
            output.push_str(&swap_glyph(token.raw(original), owner.success));
            copied = token.span.end;
        }
    }

    if let Some(open) = scope {
        warn!("No status icon found for {} before the end of the page", open.url);
    }

    output.push_str(&original[copied..]);
    output
}

// The '>'-chunk algorithm: the text since the previous '>' (including the
// tag it ends with) is checked against every result in index order.
fn rewrite_by_substring(original: &str, results: &[ValidationResult]) -> String {
    let mut ordered: Vec<&ValidationResult> = results.iter().collect();
    ordered.sort_by_key(|result| result.index);

    let mut scope: Option<&ValidationResult> = None;
    let mut output = String::with_capacity(original.len());

    for chunk in original.split_inclusive('>') {
        // Trailing text after the last '>' can't hold a tag
        if !chunk.ends_with('>') {
            output.push_str(chunk);
            continue;
        }

        let mut chunk = Cow::Borrowed(chunk);
        for &result in &ordered {
            if chunk.contains(result.url.as_str()) {
                scope = Some(result);
            } else if chunk.contains(GLYPH_TAG) {
                if let Some(owner) = scope.take() {
                    chunk = Cow::Owned(swap_glyph_in_chunk(&chunk, owner.success));
                }
            }
        }
        output.push_str(&chunk);
    }

    output
}

fn is_glyph(token: &Token) -> bool {
    token.is_start(GLYPH_TAG)
}

// Only the tag part of the chunk (from its last '<') is touched, so text
// before the tag survives even if it says "tick" or "cross".
fn swap_glyph_in_chunk(chunk: &str, success: bool) -> String {
    let tag_start = chunk.rfind('<').unwrap_or(0);
    let (before, tag) = chunk.split_at(tag_start);
    format!("{}{}", before, swap_glyph(tag, success))
}

fn swap_glyph(tag: &str, success: bool) -> String {
    if success {
        tag.replace("cross", "tick")
    } else {
        tag.replace("tick", "cross")
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is Cow<str>?
//    - "Clone on write": either a borrowed &str or an owned String
//    - Most chunks are copied as they are, so we only allocate a new
//      String for the few chunks whose icon we actually change
//
// 2. What does .peekable() / .next_if() do?
//    - peekable() lets us look at the next link without consuming it
//    - next_if(cond) consumes it only when cond is true
//    - We use it to advance through the links while walking the tokens
//
// 3. Why a HashMap of results by index?
//    - Results arrive in completion order, not document order
//    - Looking them up by index ties each result to its own row
// -----------------------------------------------------------------------------
