// src/checker/http.rs
// =============================================================================
// This module checks that redirect links work on a target environment.
//
// Key functionality:
// - Prefixes every link with the host under test and GETs it
// - Reads the whole body; WSDL and XSD links must return the right document
// - Runs checks concurrently, with a cap on in-flight requests
// - Every link produces exactly one result, even when cancelled
//
// A failing link is never an Err: it is a ValidationResult with
// success = false, so one broken link can't stop the others.
// =============================================================================

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt}; // StreamExt gives us .buffer_unordered()
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::html::LinkEntry;

const WSDL_SUFFIX: &str = "?wsdl";
const WSDL_MARKER: &str = "<wsdl:definitions";
pub const WSDL_MISSING_MESSAGE: &str =
    "URL was ending with ?wsdl but did not contain <wsdl:definition!";

const XSD_SUFFIX: &str = ".xsd";
const XSD_MARKER: &str = "<xs:schema";
pub const XSD_MISSING_MESSAGE: &str = "URL was ending with .xsd but did not contain <xs:schema!";

pub const CANCELLED_MESSAGE: &str = "validation cancelled";
pub const DEADLINE_MESSAGE: &str = "batch deadline exceeded";

/// The outcome of validating one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Which extracted link this belongs to (see LinkEntry::index)
    pub index: usize,
    /// The link as written in the document (without host prefix)
    pub url: String,
    pub success: bool,
    /// HTTP status, when we got that far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Response body on success, the reason otherwise
    pub message: String,
}

impl ValidationResult {
    fn failed(index: usize, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            success: false,
            status: None,
            message: message.into(),
        }
    }
}

/// Knobs for a validation round
#[derive(Debug, Clone)]
pub struct ValidationSettings {
    /// Maximum number of requests in flight
    pub concurrency: usize,
    /// Deadline for a single request (connect + body)
    pub request_timeout: Duration,
    /// Deadline for the whole batch, if any
    pub batch_timeout: Option<Duration>,
    /// Also fail links that answer with a non-2xx status
    pub require_success_status: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            concurrency: 50,
            request_timeout: Duration::from_secs(30),
            batch_timeout: None,
            require_success_status: false,
        }
    }
}

// Creates the HTTP client shared by all validation tasks
//
// We reuse one client for all requests (connection pooling).
// Redirects are followed (reqwest default), since following the redirect
// is exactly what we are testing.
pub fn build_client(settings: &ValidationSettings) -> Result<Client> {
    Client::builder()
        .timeout(settings.request_timeout)
        .build()
        .context("Failed to create HTTP client")
}

// Validates a single link against a host
//
// Parameters:
//   client: shared reqwest client
//   index: the LinkEntry index, copied into the result
//   url: the link text, e.g. "/services/Customer?wsdl"
//   host_prefix: e.g. "https://test.example.com"; the request goes to host_prefix + url
//   require_success_status: fail on non-2xx instead of only on transport errors
pub async fn validate_redirect(
    client: &Client,
    index: usize,
    url: &str,
    host_prefix: &str,
    require_success_status: bool,
) -> ValidationResult {
    let full_url = format!("{}{}", host_prefix, url);
    debug!("GET {}", full_url);

    let response = match client.get(&full_url).send().await {
        Ok(response) => response,
        Err(e) => return ValidationResult::failed(index, url, e.to_string()),
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            let mut result = ValidationResult::failed(index, url, e.to_string());
            result.status = Some(status.as_u16());
            return result;
        }
    };

    let mut result = ValidationResult {
        index,
        url: url.to_string(),
        success: true,
        status: Some(status.as_u16()),
        message: body,
    };

    if require_success_status && !status.is_success() {
        result.success = false;
        result.message = format!("HTTP {}", status.as_u16());
        return result;
    }

    if let Some(problem) = check_content_shape(&full_url, &result.message) {
        result.success = false;
        result.message = problem.to_string();
    }

    result
}

// WSDL and XSD endpoints must serve the matching document, anything else
// passes as long as the request went through.
//
// Returns: the failure message, or None if the body is acceptable
pub fn check_content_shape(full_url: &str, body: &str) -> Option<&'static str> {
    if full_url.ends_with(WSDL_SUFFIX) {
        (!body.contains(WSDL_MARKER)).then_some(WSDL_MISSING_MESSAGE)
    } else if full_url.ends_with(XSD_SUFFIX) {
        (!body.contains(XSD_MARKER)).then_some(XSD_MISSING_MESSAGE)
    } else {
        None
    }
}

// Validates all links concurrently
//
// Returns one result per input link (duplicates included), in completion
// order. Up to `settings.concurrency` requests run at the same time.
//
// A link whose check is still running when `cancel` fires, or when the
// batch deadline passes, gets a failed result instead of being dropped.
pub async fn validate_all(
    client: &Client,
    links: Vec<LinkEntry>,
    host_prefix: &str,
    settings: &ValidationSettings,
    cancel: &CancellationToken,
) -> Vec<ValidationResult> {
    let deadline = settings.batch_timeout.map(|limit| Instant::now() + limit);
    debug!(
        "Validating {} link(s) with concurrency {}",
        links.len(),
        settings.concurrency
    );

    let futures = links.into_iter().map(move |link| async move {
        validate_guarded(client, link, host_prefix, settings, cancel, deadline).await
    });

    stream::iter(futures)
        .buffer_unordered(settings.concurrency.max(1))
        .collect()
        .await
}

async fn validate_guarded(
    client: &Client,
    link: LinkEntry,
    host_prefix: &str,
    settings: &ValidationSettings,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> ValidationResult {
    let LinkEntry { index, url, .. } = link;

    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = validate_redirect(client, index, &url, host_prefix, settings.require_success_status) => result,
        _ = cancel.cancelled() => {
            warn!("Cancelled validation of {}", url);
            ValidationResult::failed(index, url.as_str(), CANCELLED_MESSAGE)
        }
        _ = expired => {
            warn!("Batch deadline hit while validating {}", url);
            ValidationResult::failed(index, url.as_str(), DEADLINE_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn link(index: usize, url: &str) -> LinkEntry {
        LinkEntry {
            index,
            url: url.to_string(),
            span: 0..0,
        }
    }

    #[tokio::test]
    async fn test_plain_link_succeeds_with_body() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;
        let client = build_client(&ValidationSettings::default()).unwrap();

        let result = validate_redirect(&client, 3, "/ok", &server.url(), false).await;

        assert!(result.success);
        assert_eq!(result.index, 3);
        assert_eq!(result.url, "/ok");
        assert_eq!(result.status, Some(200));
        assert_eq!(result.message, "hello");
    }

    #[tokio::test]
    async fn test_non_2xx_is_success_by_default() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;
        let client = build_client(&ValidationSettings::default()).unwrap();

        let result = validate_redirect(&client, 0, "/missing", &server.url(), false).await;

        assert!(result.success);
        assert_eq!(result.status, Some(404));
    }

    #[tokio::test]
    async fn test_non_2xx_fails_when_required() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        let client = build_client(&ValidationSettings::default()).unwrap();

        let result = validate_redirect(&client, 0, "/missing", &server.url(), true).await;

        assert!(!result.success);
        assert_eq!(result.message, "HTTP 404");
    }

    #[tokio::test]
    async fn test_wsdl_without_definitions_fails_despite_200() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/service?wsdl")
            .with_status(200)
            .with_body("<html>login page</html>")
            .create_async()
            .await;
        let client = build_client(&ValidationSettings::default()).unwrap();

        let result = validate_redirect(&client, 0, "/service?wsdl", &server.url(), false).await;

        assert!(!result.success);
        assert_eq!(result.status, Some(200));
        assert_eq!(result.message, WSDL_MISSING_MESSAGE);
    }

    #[tokio::test]
    async fn test_wsdl_with_definitions_succeeds() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/service?wsdl")
            .with_status(200)
            .with_body(r#"<?xml version="1.0"?><wsdl:definitions xmlns:wsdl="x"></wsdl:definitions>"#)
            .create_async()
            .await;
        let client = build_client(&ValidationSettings::default()).unwrap();

        let result = validate_redirect(&client, 0, "/service?wsdl", &server.url(), false).await;

        assert!(result.success);
    }

    #[tokio::test]
    async fn test_xsd_without_schema_fails() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/types.xsd")
            .with_status(200)
            .with_body("<wsdl:definitions>")
            .create_async()
            .await;
        let client = build_client(&ValidationSettings::default()).unwrap();

        let result = validate_redirect(&client, 0, "/types.xsd", &server.url(), false).await;

        assert!(!result.success);
        assert_eq!(result.message, XSD_MISSING_MESSAGE);
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_failed_result() {
        let client = build_client(&ValidationSettings::default()).unwrap();

        // Port 1 on localhost is essentially never listening
        let result = validate_redirect(&client, 0, "/x", "http://127.0.0.1:1", false).await;

        assert!(!result.success);
        assert_eq!(result.status, None);
        assert!(!result.message.is_empty());
    }

    #[test]
    fn test_content_shape_rules() {
        assert_eq!(check_content_shape("http://h/a", ""), None);
        assert_eq!(
            check_content_shape("http://h/a?wsdl", "<xs:schema>"),
            Some(WSDL_MISSING_MESSAGE)
        );
        assert_eq!(check_content_shape("http://h/a.xsd", "<xs:schema>"), None);
        assert_eq!(
            check_content_shape("http://h/a.xsd", "nothing"),
            Some(XSD_MISSING_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_validate_all_is_exhaustive_with_duplicates() {
        let mut server = Server::new_async().await;
        let _a = server
            .mock("GET", "/a")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/b.xsd")
            .with_status(200)
            .create_async()
            .await;
        let settings = ValidationSettings {
            concurrency: 2,
            ..ValidationSettings::default()
        };
        let client = build_client(&settings).unwrap();
        let links = vec![link(0, "/a"), link(1, "/b.xsd"), link(2, "/a")];

        let mut results = validate_all(
            &client,
            links,
            &server.url(),
            &settings,
            &CancellationToken::new(),
        )
        .await;
        results.sort_by_key(|r| r.index);

        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[2].success);
    }

    #[tokio::test]
    async fn test_validate_all_empty() {
        let client = build_client(&ValidationSettings::default()).unwrap();
        let results = validate_all(
            &client,
            Vec::new(),
            "http://unused",
            &ValidationSettings::default(),
            &CancellationToken::new(),
        )
        .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_batch_still_reports_every_link() {
        let client = build_client(&ValidationSettings::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // 192.0.2.0/24 is reserved for documentation; cancellation wins the race
        let links = vec![link(0, "/a"), link(1, "/b")];
        let results = validate_all(
            &client,
            links,
            "http://192.0.2.1",
            &ValidationSettings::default(),
            &cancel,
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn test_batch_deadline_fails_hanging_links() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let settings = ValidationSettings {
            batch_timeout: Some(Duration::from_millis(100)),
            ..ValidationSettings::default()
        };
        let client = build_client(&settings).unwrap();
        let links = vec![link(0, "/a"), link(1, "/b"), link(2, "/a")];

        let results = validate_all(
            &client,
            links,
            &format!("http://{}", addr),
            &settings,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(results.len(), 3);
        for result in &results {
            assert!(!result.success, "{result:?}");
            assert_eq!(result.message, DEADLINE_MESSAGE);
            assert_eq!(result.status, None);
        }
    }
}
