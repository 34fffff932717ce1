// src/checker/html.rs
// =============================================================================
// This module extracts the links listed in the table of a Confluence page.
//
// The page keeps one link per table row, like this:
//
//   <tr>
//     <td><a href="...">/some/redirect</a></td>
//     <td><ac:emoticon ac:name="tick" /></td>
//   </tr>
//
// The URL we validate is the TEXT of the anchor (a path relative to the
// host we are testing), not its href.
//
// Rules (applied token by token, see markup.rs):
// 1. A <td> start tag opens a cell
// 2. The very next token must be an <a> start tag, otherwise the cell is skipped
// 3. The token after that must be text; that text is the URL
// Tokens consumed by steps 2 and 3 are never looked at again.
//
// Rust concepts:
// - Iterators: extraction is lazy, links are produced one at a time
// - Lifetimes: the iterator borrows the document instead of copying it
// =============================================================================

use std::ops::Range;

use super::markup::{Token, TokenKind, Tokenizer};

/// One link found in a table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    /// Position of this link among all extracted links (0-based, document order)
    pub index: usize,
    /// The link text, e.g. "/services/Customer?wsdl"
    pub url: String,
    /// Byte range of the anchor text in the document
    pub span: Range<usize>,
}

/// Lazy iterator over the links of a document, see `extract_table_links`
pub struct TableLinks<'a> {
    source: &'a str,
    tokens: Tokenizer<'a>,
    next_index: usize,
}

// Extracts all table-cell links from a document
//
// Parameters:
//   document: the storage-format markup (borrowed)
//
// Returns: an iterator of LinkEntry in document order, duplicates included
//
// Example:
//   "<td><a>/a</a></td><td><a>/b</a></td>" -> ["/a", "/b"]
pub fn extract_table_links(document: &str) -> TableLinks<'_> {
    TableLinks {
        source: document,
        tokens: Tokenizer::new(document),
        next_index: 0,
    }
}

impl Iterator for TableLinks<'_> {
    type Item = LinkEntry;

    fn next(&mut self) -> Option<LinkEntry> {
        loop {
            // `?` here means: end of input (or broken markup) = no more links
            let token = self.tokens.next()?;
            if !opens_cell(&token) {
                continue;
            }

            let anchor = self.tokens.next()?;
            if !anchor.is_start("a") {
                continue;
            }

            let value = self.tokens.next()?;
            let Some(url) = value.text(self.source) else {
                continue;
            };

            let entry = LinkEntry {
                index: self.next_index,
                url,
                span: value.span,
            };
            self.next_index += 1;
            return Some(entry);
        }
    }
}

// <td> and <td/> open a cell, </td> does not
fn opens_cell(token: &Token) -> bool {
    matches!(&token.kind, TokenKind::StartTag { name, .. } if name == "td")
}
