// src/confluence/client.rs
// =============================================================================
// This module reads and writes a Confluence page through the REST API.
//
// Endpoints (relative to the wiki base URL, e.g. https://acme.atlassian.net/wiki):
// - GET  rest/api/content/{id}?expand=history,space,version,body.storage
// - PUT  rest/api/content/{id}   (same JSON shape, version number + 1)
//
// Confluence rejects an update unless the version number is exactly one
// higher than the stored one; the caller bumps it before calling update().
//
// Any failure here is fatal for the run: without the page there is
// nothing to check, and a failed update means the report is stale.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;

const EXPAND: &str = "history,space,version,body.storage";

/// A Confluence page, limited to the fields we read or must send back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<Space>,
    pub version: Version,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub storage: Storage,
}

/// The page markup in "storage" representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub value: String,
    pub representation: String,
}

/// What we need back from an update; Confluence doesn't expand the body
/// of an update response unless asked to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdatedContent {
    pub id: String,
    pub version: Version,
}

/// Where documents come from and go back to
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, content_id: &str) -> Result<Content>;
    async fn update(&self, content: &Content) -> Result<UpdatedContent>;
}

/// DocumentStore backed by the Confluence REST API
pub struct ConfluenceClient {
    client: Client,
    base: Url,
    credentials: Option<(String, String)>,
}

impl ConfluenceClient {
    // Parameters:
    //   base_url: wiki root, e.g. "https://acme.atlassian.net/wiki"
    //   username/password: basic auth; an empty username means anonymous
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| anyhow!("Invalid Confluence URL '{}': {}", base_url, e))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("Confluence URL can't be used as a base: {}", base_url));
        }

        let client = Client::builder()
            .build()
            .context("Failed to create Confluence HTTP client")?;

        let credentials =
            (!username.is_empty()).then(|| (username.to_string(), password.to_string()));

        Ok(Self {
            client,
            base,
            credentials,
        })
    }

    // {base}/rest/api/content/{id}, keeping any path the base already has
    fn content_url(&self, content_id: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Confluence URL can't be used as a base: {}", self.base))?
            .pop_if_empty()
            .extend(["rest", "api", "content", content_id]);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }
}

#[async_trait]
impl DocumentStore for ConfluenceClient {
    async fn fetch(&self, content_id: &str) -> Result<Content> {
        let url = self.content_url(content_id)?;
        debug!("GET {}", url);

        let request = self.client.get(url).query(&[("expand", EXPAND)]);
        let response = self.authorize(request).send().await?;
        let response = ensure_success(response, "Fetching content").await?;

        let content = response
            .json::<Content>()
            .await
            .context("Confluence returned content in an unexpected format")?;
        Ok(content)
    }

    async fn update(&self, content: &Content) -> Result<UpdatedContent> {
        let url = self.content_url(&content.id)?;
        debug!("PUT {} (version {})", url, content.version.number);

        let request = self.client.put(url).json(content);
        let response = self.authorize(request).send().await?;
        let response = ensure_success(response, "Updating content").await?;

        let saved = response
            .json::<UpdatedContent>()
            .await
            .context("Confluence returned an unexpected update response")?;
        Ok(saved)
    }
}

// Turns a non-2xx response into an error that includes Confluence's own
// explanation (it usually says what was wrong with the request)
async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let details = response.text().await.unwrap_or_default();
    Err(anyhow!("{} failed: HTTP {}: {}", action, status, details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn page_json(number: u64, value: &str) -> serde_json::Value {
        json!({
            "id": "42",
            "type": "page",
            "title": "Redirects",
            "space": { "key": "ASD", "name": "ignored" },
            "version": { "number": number, "by": { "displayName": "ignored" } },
            "body": { "storage": { "value": value, "representation": "storage" } },
            "_links": { "self": "ignored" }
        })
    }

    #[tokio::test]
    async fn test_fetch_content() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/wiki/rest/api/content/42")
            .match_query(Matcher::UrlEncoded("expand".into(), EXPAND.into()))
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_json(7, "<p>hi</p>").to_string())
            .create_async()
            .await;
        let client = ConfluenceClient::new(&format!("{}/wiki", server.url()), "user", "pass").unwrap();

        let content = client.fetch("42").await.unwrap();

        assert_eq!(content.id, "42");
        assert_eq!(content.kind, "page");
        assert_eq!(content.version.number, 7);
        assert_eq!(content.space, Some(Space { key: "ASD".to_string() }));
        assert_eq!(content.body.storage.value, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/wiki/rest/api/content/404")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("No content found with id 404")
            .create_async()
            .await;
        let client = ConfluenceClient::new(&format!("{}/wiki/", server.url()), "", "").unwrap();

        let error = client.fetch("404").await.unwrap_err();

        let message = error.to_string();
        assert!(message.contains("HTTP 404"), "{message}");
        assert!(message.contains("No content found"), "{message}");
    }

    #[tokio::test]
    async fn test_update_sends_new_version() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/wiki/rest/api/content/42")
            .match_body(Matcher::PartialJson(json!({
                "id": "42",
                "type": "page",
                "version": { "number": 8 },
                "body": { "storage": { "value": "<p>new</p>", "representation": "storage" } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_json(8, "<p>new</p>").to_string())
            .create_async()
            .await;
        let client = ConfluenceClient::new(&format!("{}/wiki", server.url()), "", "").unwrap();
        let mut content: Content = serde_json::from_value(page_json(7, "<p>old</p>")).unwrap();
        content.body.storage.value = "<p>new</p>".to_string();
        content.version.number += 1;

        let saved = client.update(&content).await.unwrap();

        assert_eq!(saved.version.number, 8);
    }

    #[tokio::test]
    async fn test_update_response_without_body() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/wiki/rest/api/content/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "id": "42", "type": "page", "version": { "number": 8 } }).to_string())
            .create_async()
            .await;
        let client = ConfluenceClient::new(&format!("{}/wiki", server.url()), "", "").unwrap();
        let mut content: Content = serde_json::from_value(page_json(7, "<p>x</p>")).unwrap();
        content.version.number += 1;

        let saved = client.update(&content).await.unwrap();

        assert_eq!(saved.id, "42");
        assert_eq!(saved.version.number, 8);
    }

    #[tokio::test]
    async fn test_update_conflict_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/wiki/rest/api/content/42")
            .with_status(409)
            .with_body("Version must be incremented")
            .create_async()
            .await;
        let client = ConfluenceClient::new(&format!("{}/wiki", server.url()), "", "").unwrap();
        let content: Content = serde_json::from_value(page_json(7, "<p>x</p>")).unwrap();

        let error = client.update(&content).await.unwrap_err();

        assert!(error.to_string().contains("HTTP 409"));
    }

    #[test]
    fn test_content_url_keeps_base_path() {
        let client = ConfluenceClient::new("https://acme.atlassian.net/wiki", "", "").unwrap();
        let url = client.content_url("2428384").unwrap();
        assert_eq!(
            url.as_str(),
            "https://acme.atlassian.net/wiki/rest/api/content/2428384"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ConfluenceClient::new("not a url", "", "").is_err());
        assert!(ConfluenceClient::new("mailto:someone@example.com", "", "").is_err());
    }
}
