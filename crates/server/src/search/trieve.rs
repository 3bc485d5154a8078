//! Trieve semantic search API client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::TrieveConfig;

use super::document::TrieveChunk;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the Trieve backend.
#[derive(Debug, Error)]
pub enum TrieveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Trieve error {status}: {message}")]
    Api { status: u16, message: String },
}

/// One scored search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrieveHit {
    pub tracking_id: Option<String>,
    pub metadata: Value,
    pub score: f64,
}

/// Result page of a semantic search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrieveSearchResult {
    pub hits: Vec<TrieveHit>,
    pub total_pages: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    chunks: Vec<ScoredChunk>,
    #[serde(default)]
    total_chunk_pages: u64,
}

#[derive(Deserialize)]
struct ScoredChunk {
    #[serde(default)]
    chunk: ChunkBody,
    #[serde(default)]
    score: f64,
}

#[derive(Default, Deserialize)]
struct ChunkBody {
    #[serde(default)]
    tracking_id: Option<String>,
    #[serde(default)]
    metadata: Value,
}

/// Trieve client bound to one dataset.
#[derive(Clone)]
pub struct TrieveClient {
    inner: Arc<TrieveClientInner>,
}

struct TrieveClientInner {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    dataset_id: String,
    organization_id: Option<String>,
}

impl TrieveClient {
    /// Create a client for the configured dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TrieveConfig) -> Result<Self, TrieveError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(TrieveClientInner {
                client,
                endpoint: config.endpoint.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                dataset_id: config.dataset_id.clone(),
                organization_id: config.organization_id.clone(),
            }),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.inner.endpoint, path.trim_start_matches('/'));
        let mut builder = self
            .inner
            .client
            .request(method, url)
            .header("Authorization", self.inner.api_key.expose_secret())
            .header("TR-Dataset", &self.inner.dataset_id);
        if let Some(org) = &self.inner.organization_id {
            builder = builder.header("TR-Organization", org);
        }
        builder
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, TrieveError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "Trieve returned non-success status"
            );
            return Err(TrieveError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Create or replace the chunk for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, chunk), fields(tracking_id = %chunk.tracking_id))]
    pub async fn index_chunk(&self, chunk: &TrieveChunk) -> Result<(), TrieveError> {
        self.execute(self.request(Method::POST, "chunk").json(chunk))
            .await?;
        Ok(())
    }

    /// Semantic search, optionally restricted to one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
        category_id: Option<u64>,
    ) -> Result<TrieveSearchResult, TrieveError> {
        let body = search_body(query, page, page_size, category_id);
        let response = self
            .execute(self.request(Method::POST, "chunk/search").json(&body))
            .await?;

        let parsed: SearchResponse = serde_json::from_value(response)?;
        debug!(hits = parsed.chunks.len(), "Trieve search completed");

        Ok(TrieveSearchResult {
            hits: parsed
                .chunks
                .into_iter()
                .map(|c| TrieveHit {
                    tracking_id: c.chunk.tracking_id,
                    metadata: c.chunk.metadata,
                    score: c.score,
                })
                .collect(),
            total_pages: parsed.total_chunk_pages,
        })
    }

    /// Remove the chunk of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn delete_chunk(&self, tracking_id: &str) -> Result<(), TrieveError> {
        self.execute(self.request(Method::DELETE, &format!("chunk/tracking_id/{tracking_id}")))
            .await?;
        Ok(())
    }

    /// Whether the API answers its health check.
    ///
    /// # Errors
    ///
    /// Returns an error if the API cannot be reached.
    pub async fn health(&self) -> Result<(), TrieveError> {
        self.execute(self.request(Method::GET, "health")).await?;
        Ok(())
    }

    /// Datasets of the configured organization, or `None` when no
    /// organization id is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn datasets(&self) -> Result<Option<Value>, TrieveError> {
        let Some(org) = self.inner.organization_id.as_deref() else {
            return Ok(None);
        };
        self.execute(self.request(Method::GET, &format!("dataset/organization/{org}")))
            .await
            .map(Some)
    }
}

fn search_body(query: &str, page: u32, page_size: u32, category_id: Option<u64>) -> Value {
    let mut body = json!({
        "query": query,
        "search_type": "semantic",
        "page": page.max(1),
        "page_size": page_size.max(1),
    });
    if let Some(id) = category_id {
        body["filters"] = json!({
            "must": [{ "field": "metadata.category_id", "match": [id] }]
        });
    }
    body
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(organization_id: Option<&str>) -> TrieveConfig {
        TrieveConfig {
            api_key: SecretString::from("tr-test-key"),
            endpoint: "http://127.0.0.1:9/api/".to_string(),
            dataset_id: "dataset-1".to_string(),
            organization_id: organization_id.map(str::to_string),
        }
    }

    #[test]
    fn test_search_body() {
        let body = search_body("buty do biegania", 0, 20, None);
        assert_eq!(body["search_type"], "semantic");
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_size"], 20);
        assert!(body.get("filters").is_none());

        let body = search_body("buty", 2, 10, Some(7));
        assert_eq!(body["filters"]["must"][0]["field"], "metadata.category_id");
        assert_eq!(body["filters"]["must"][0]["match"][0], 7);
    }

    #[test]
    fn test_parse_search_response() {
        let response: SearchResponse = serde_json::from_value(json!({
            "chunks": [
                { "chunk": { "tracking_id": "17", "metadata": { "price": 10 } }, "score": 0.91 },
                { "chunk": {}, "score": 0.2 }
            ],
            "total_chunk_pages": 3
        }))
        .unwrap();

        assert_eq!(response.total_chunk_pages, 3);
        assert_eq!(response.chunks[0].chunk.tracking_id.as_deref(), Some("17"));
        assert!(response.chunks[1].chunk.tracking_id.is_none());
    }

    #[test]
    fn test_request_headers() {
        let client = TrieveClient::new(&config(Some("org-1"))).unwrap();
        let request = client.request(Method::GET, "/health").build().unwrap();

        assert_eq!(request.url().as_str(), "http://127.0.0.1:9/api/health");
        assert_eq!(request.headers()["Authorization"], "tr-test-key");
        assert_eq!(request.headers()["TR-Dataset"], "dataset-1");
        assert_eq!(request.headers()["TR-Organization"], "org-1");
    }

    #[tokio::test]
    async fn test_datasets_without_organization() {
        let client = TrieveClient::new(&config(None)).unwrap();
        assert!(client.datasets().await.unwrap().is_none());

        let client = TrieveClient::new(&config(Some("org-1"))).unwrap();
        assert!(client.datasets().await.is_err());
    }
}
