// src/confluence/mod.rs
// =============================================================================
// This module talks to the Confluence page that holds the link table.
//
// Currently implements:
// - Fetching a page (storage format body + version) by content id
// - Updating the page body with an incremented version number
//
// The rest of the app only sees the DocumentStore trait, so the pipeline
// can be tested against an in-memory store.
// =============================================================================

mod client;

pub use client::{ConfluenceClient, Content, DocumentStore, UpdatedContent};
