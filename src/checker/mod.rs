// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - markup: Splits storage-format markup into tokens with byte positions
// - html: Extracts the links listed in table cells
// - http: Validates links against the host under test
// - rewrite: Updates the status icon next to every link
//
// Data flows: document -> html -> http -> rewrite -> document
// =============================================================================

// Declare submodules (tells Rust to include these files)
mod html;
mod http;
mod markup;
mod rewrite;

// Re-export public items from submodules
// This lets users write `checker::validate_all()` instead of
// `checker::http::validate_all()`
pub use html::{extract_table_links, LinkEntry};
pub use http::{build_client, validate_all, ValidationResult, ValidationSettings};
pub use rewrite::{rewrite_statuses, MatchMode};
