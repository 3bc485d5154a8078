//! Elasticsearch product index over its REST API.

pub mod mapping;
pub mod query;

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::ElasticsearchConfig;

use super::document::ProductDocument;
use query::ProductSearch;

/// Errors from the Elasticsearch backend.
#[derive(Debug, Error)]
pub enum ElasticsearchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-success response.
    #[error("Elasticsearch error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Outcome of one document in a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkOutcome {
    /// Not yet acknowledged.
    Pending,
    Indexed,
    Failed { error: String },
}

/// Search result in the shape returned to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct EsSearchResult {
    pub query: String,
    pub total_results: u64,
    pub results: Vec<Value>,
    pub aggregations: Value,
    pub metadata: EsSearchMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct EsSearchMetadata {
    pub took: u64,
    pub timed_out: bool,
    pub provider: &'static str,
}

/// Elasticsearch client bound to one index.
#[derive(Clone)]
pub struct ElasticsearchClient {
    inner: Arc<ElasticsearchClientInner>,
}

struct ElasticsearchClientInner {
    client: reqwest::Client,
    host: String,
    index: String,
    username: Option<String>,
    password: Option<SecretString>,
}

impl ElasticsearchClient {
    /// Create a client for the configured host and index.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, ElasticsearchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            inner: Arc::new(ElasticsearchClientInner {
                client,
                host: config.host.trim_end_matches('/').to_string(),
                index: config.index.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            }),
        })
    }

    /// Index name.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.inner.index
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.inner.host, path.trim_start_matches('/'));
        let builder = self.inner.client.request(method, url);
        match &self.inner.username {
            Some(user) => builder.basic_auth(
                user,
                self.inner.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => builder,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, ElasticsearchError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "Elasticsearch returned non-success status"
            );
            return Err(ElasticsearchError::Api {
                status: status.as_u16(),
                message: error_reason(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Create the index with its mapping unless it exists.
    ///
    /// Returns `true` when the index was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be reached or rejects the
    /// definition.
    #[instrument(skip(self), fields(index = %self.inner.index))]
    pub async fn ensure_index(&self) -> Result<bool, ElasticsearchError> {
        let response = self
            .request(Method::HEAD, &self.inner.index)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                info!("Creating products index");
                self.execute(
                    self.request(Method::PUT, &self.inner.index)
                        .json(&mapping::index_definition()),
                )
                .await?;
                Ok(true)
            }
            status if status.is_success() => Ok(false),
            status => Err(ElasticsearchError::Api {
                status: status.as_u16(),
                message: "index existence check failed".to_string(),
            }),
        }
    }

    /// Index or replace one document. Returns `true` when it was created or
    /// updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, doc), fields(product_id = %doc.product_id))]
    pub async fn index_product(&self, doc: &ProductDocument) -> Result<bool, ElasticsearchError> {
        let path = format!("{}/_doc/{}?refresh=true", self.inner.index, doc.product_id);
        let body = self.execute(self.request(Method::PUT, &path).json(doc)).await?;

        Ok(matches!(
            body.get("result").and_then(Value::as_str),
            Some("created" | "updated")
        ))
    }

    /// Index many documents with one `_bulk` call.
    ///
    /// Never fails as a whole: a failed call marks every document failed.
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    pub async fn bulk_index(&self, docs: &[ProductDocument]) -> BTreeMap<String, BulkOutcome> {
        let mut outcomes: BTreeMap<String, BulkOutcome> = BTreeMap::new();
        let mut body = String::new();

        for doc in docs {
            let action = json!({ "index": { "_index": self.inner.index, "_id": doc.product_id } });
            match serde_json::to_string(doc) {
                Ok(source) => {
                    body.push_str(&action.to_string());
                    body.push('\n');
                    body.push_str(&source);
                    body.push('\n');
                    outcomes.insert(doc.product_id.clone(), BulkOutcome::Pending);
                }
                Err(e) => {
                    outcomes.insert(
                        doc.product_id.clone(),
                        BulkOutcome::Failed {
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        if body.is_empty() {
            return outcomes;
        }

        let request = self
            .request(Method::POST, "_bulk?refresh=true")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);

        match self.execute(request).await {
            Ok(response) => apply_bulk_response(&mut outcomes, &response),
            Err(e) => {
                warn!(error = %e, "Bulk indexing failed");
                for outcome in outcomes.values_mut() {
                    if *outcome == BulkOutcome::Pending {
                        *outcome = BulkOutcome::Failed {
                            error: format!("Bulk operation failed: {e}"),
                        };
                    }
                }
            }
        }

        outcomes
    }

    /// Remove a document. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: &str) -> Result<bool, ElasticsearchError> {
        let path = format!("{}/_doc/{product_id}?refresh=true", self.inner.index);
        match self.execute(self.request(Method::DELETE, &path)).await {
            Ok(_) => Ok(true),
            Err(ElasticsearchError::Api { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run a product search.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, search), fields(query = %original_query))]
    pub async fn search_products(
        &self,
        original_query: &str,
        search: &ProductSearch,
    ) -> Result<EsSearchResult, ElasticsearchError> {
        let path = format!("{}/_search", self.inner.index);
        let response = self
            .execute(self.request(Method::POST, &path).json(&query::search_body(search)))
            .await?;

        let result = format_search_response(original_query, &response);
        debug!(total = result.total_results, "Elasticsearch search completed");
        Ok(result)
    }

    /// Distinct product names starting with the given prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn suggest(&self, prefix: &str) -> Result<Vec<String>, ElasticsearchError> {
        let Some(body) = query::suggest_body(prefix) else {
            return Ok(Vec::new());
        };

        let path = format!("{}/_search", self.inner.index);
        let response = self
            .execute(self.request(Method::POST, &path).json(&body))
            .await?;

        let mut names: Vec<String> = Vec::new();
        for hit in hits(&response) {
            if let Some(name) = hit.pointer("/_source/name").and_then(Value::as_str) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Cluster health status (`green`, `yellow`, `red`).
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be reached.
    pub async fn health(&self) -> Result<String, ElasticsearchError> {
        let body = self
            .execute(self.request(Method::GET, "_cluster/health"))
            .await?;
        Ok(body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}

fn hits(response: &Value) -> &[Value] {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

fn format_search_response(query: &str, response: &Value) -> EsSearchResult {
    let results = hits(response)
        .iter()
        .map(|hit| {
            let mut item = hit.get("_source").cloned().unwrap_or_else(|| json!({}));
            if let Value::Object(map) = &mut item {
                map.insert("score".to_string(), hit.get("_score").cloned().unwrap_or(Value::Null));
                map.insert(
                    "highlight".to_string(),
                    hit.get("highlight").cloned().unwrap_or_else(|| json!({})),
                );
            }
            item
        })
        .collect();

    EsSearchResult {
        query: query.to_string(),
        total_results: response
            .pointer("/hits/total/value")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
        results,
        aggregations: response
            .get("aggregations")
            .cloned()
            .unwrap_or_else(|| json!({})),
        metadata: EsSearchMetadata {
            took: response.get("took").and_then(Value::as_u64).unwrap_or_default(),
            timed_out: response
                .get("timed_out")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            provider: "elasticsearch",
        },
    }
}

fn apply_bulk_response(outcomes: &mut BTreeMap<String, BulkOutcome>, response: &Value) {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);

    for item in items {
        let Some(op) = item.get("index") else {
            continue;
        };
        let Some(id) = op.get("_id").and_then(Value::as_str) else {
            continue;
        };

        let outcome = match op.get("error") {
            Some(error) => BulkOutcome::Failed {
                error: error
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            },
            None => BulkOutcome::Indexed,
        };
        outcomes.insert(id.to_string(), outcome);
    }
}

fn error_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/reason")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
