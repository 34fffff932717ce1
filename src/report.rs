// src/report.rs
// =============================================================================
// This module runs one full sync of the link report:
//
// 1. Fetch the page from the document store
// 2. Extract the links from its table
// 3. Validate all links against the host under test
// 4. Rewrite the status icons
// 5. Push the page back with version + 1 (unless nothing changed or dry run)
//
// Validation and rewriting never interleave: the rewrite starts only after
// every link has a result.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use reqwest::Client;
use serde::Serialize;
use std::fmt::Write;
use tokio_util::sync::CancellationToken;

use crate::checker::{self, LinkEntry, MatchMode, ValidationResult, ValidationSettings};
use crate::confluence::DocumentStore;

/// Everything needed for one sync
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub content_id: String,
    /// Prepended to every link, e.g. "https://test.example.com"
    pub host_prefix: String,
    pub settings: ValidationSettings,
    pub match_mode: MatchMode,
    /// Compute the new page but don't upload it
    pub dry_run: bool,
}

/// What a sync did
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// One per extracted link, in document order
    pub results: Vec<ValidationResult>,
    /// The page body after rewriting
    #[serde(skip)]
    pub rewritten: String,
    /// Whether any status icon changed
    pub changed: bool,
    /// The page version after our update, if we updated it
    pub updated_version: Option<u64>,
}

impl SyncReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    // One pair of lines per link:
    //   URL: /services/Customer?wsdl
    //       Success: true
    pub fn status_lines(&self) -> String {
        let mut lines = String::new();
        for result in &self.results {
            // Writing into a String can't fail
            let _ = writeln!(lines, "URL: {}", result.url);
            let _ = writeln!(lines, "    Success: {}", result.success);
        }
        lines
    }

    /// The whole report as one JSON object, with the rewritten page
    /// included when `include_document` is set (dry runs)
    pub fn to_json(&self, include_document: bool) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if include_document {
            value["rewritten"] = serde_json::Value::String(self.rewritten.clone());
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

pub async fn sync_link_report<S>(
    store: &S,
    client: &Client,
    job: &SyncJob,
    cancel: &CancellationToken,
) -> Result<SyncReport>
where
    S: DocumentStore + ?Sized,
{
    let mut content = store
        .fetch(&job.content_id)
        .await
        .with_context(|| format!("Could not fetch content {}", job.content_id))?;
    debug!("Fetched content body: {}", content.body.storage.value);

    let original = content.body.storage.value.clone();
    let links: Vec<LinkEntry> = checker::extract_table_links(&original).collect();
    info!("Found {} link(s) in \"{}\"", links.len(), content.title);

    let mut results =
        checker::validate_all(client, links, &job.host_prefix, &job.settings, cancel).await;
    results.sort_by_key(|result| result.index);

    // Cancelled links were never checked, so nothing gets rewritten or pushed
    if cancel.is_cancelled() {
        return Err(anyhow!(
            "Validation cancelled, content {} left unchanged",
            job.content_id
        ));
    }

    let rewritten = checker::rewrite_statuses(&original, &results, job.match_mode);
    let changed = rewritten != original;
    debug!("Rewritten content body: {}", rewritten);

    let mut updated_version = None;
    if job.dry_run {
        info!("Dry run, not updating content {}", job.content_id);
    } else if !changed {
        info!("All status icons already up to date, not updating");
    } else {
        content.body.storage.value = rewritten.clone();
        content.version.number += 1;
        let saved = store
            .update(&content)
            .await
            .with_context(|| format!("Could not update content {}", job.content_id))?;
        info!("Updated content {} to version {}", saved.id, saved.version.number);
        updated_version = Some(saved.version.number);
    }

    Ok(SyncReport {
        results,
        rewritten,
        changed,
        updated_version,
    })
}
