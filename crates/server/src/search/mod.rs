//! Product search.
//!
//! # Architecture
//!
//! - [`QueryParser`](query_parser::QueryParser) pulls brand, colour, size and
//!   price out of the query text
//! - One backend answers searches: Elasticsearch (full text with facets) or
//!   Trieve (semantic, results hydrated from the Shoper API)
//! - When the backend fails, the Shoper products list is searched by name and
//!   re-ranked locally
//! - Successful backend responses are cached in-memory via `moka`

pub mod document;
pub mod elasticsearch;
pub mod query_parser;
pub mod ranking;
pub mod trieve;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{SearchConfig, SearchDriver};
use crate::shoper::types::{ListPage, MAX_LIST_LIMIT};
use crate::shoper::{ListParams, ShoperClient, ShoperError, ShoperProduct};

use document::{ProductDocument, to_trieve_chunk};
use elasticsearch::query::{ExternalFilters, ProductSearch};
use elasticsearch::{BulkOutcome, ElasticsearchClient, ElasticsearchError};
use query_parser::{ParsedQuery, QueryParser, SearchFilters};
use ranking::{fallback_rank, sanitize_query};
use trieve::{TrieveClient, TrieveError};

/// How long search responses stay cached.
const RESULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Maximum number of cached search responses.
const RESULT_CACHE_CAPACITY: u64 = 1000;

/// Products fetched per page while reindexing.
const REINDEX_PAGE_SIZE: u32 = 50;

/// Default cap on products reindexed in one run.
pub const DEFAULT_REINDEX_LIMIT: u32 = 1000;

/// Errors from the search layer.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query is empty after sanitising.
    #[error("Search query is empty")]
    EmptyQuery,

    #[error("Elasticsearch error: {0}")]
    Elasticsearch(#[from] ElasticsearchError),

    #[error("Trieve error: {0}")]
    Trieve(#[from] TrieveError),

    #[error("Shoper API error: {0}")]
    Shoper(#[from] ShoperError),

    /// The selected backend is not configured.
    #[error("Search backend not configured: {0}")]
    NotConfigured(&'static str),
}

/// The search backend in use.
#[derive(Clone)]
pub enum SearchProvider {
    Elasticsearch(ElasticsearchClient),
    Trieve(TrieveClient),
}

impl SearchProvider {
    /// Build the backend selected by `SEARCH_DRIVER`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be configured.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        match config.driver {
            SearchDriver::Elasticsearch => Ok(Self::Elasticsearch(ElasticsearchClient::new(
                &config.elasticsearch,
            )?)),
            SearchDriver::Trieve => {
                let trieve = config
                    .trieve
                    .as_ref()
                    .ok_or(SearchError::NotConfigured("trieve"))?;
                Ok(Self::Trieve(TrieveClient::new(trieve)?))
            }
        }
    }

    /// Provider name reported to clients.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Elasticsearch(_) => "elasticsearch",
            Self::Trieve(_) => "trieve",
        }
    }
}

/// A search as requested by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub limit: u32,
    pub page: u32,
    pub category_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SearchCacheKey {
    query: String,
    limit: u32,
    page: u32,
    category_id: Option<u64>,
}

/// Search response body.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub message: String,
    pub query: String,
    pub items: Vec<Value>,
    pub count: u64,
    pub page: u32,
    pub limit: u32,
    pub category_id: Option<u64>,
    pub total_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedQuery>,
    pub metadata: SearchMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMetadata {
    pub provider: &'static str,
    pub enhanced_by_ai: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub took_ms: Option<u64>,
    pub fallback: bool,
    pub timestamp: DateTime<Utc>,
}

/// Counters of a full reindex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

/// Backend health as reported by status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub provider: &'static str,
    pub status: String,
    /// Datasets visible to the Trieve organization, when one is configured.
    pub datasets: Option<usize>,
}

/// Search entry point shared by handlers.
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<SearchServiceInner>,
}

struct SearchServiceInner {
    parser: QueryParser,
    provider: SearchProvider,
    cache: Cache<SearchCacheKey, Arc<SearchResponse>>,
}

impl SearchService {
    /// Create a search service.
    #[must_use]
    pub fn new(provider: SearchProvider, parser: QueryParser) -> Self {
        let cache = Cache::builder()
            .max_capacity(RESULT_CACHE_CAPACITY)
            .time_to_live(RESULT_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(SearchServiceInner {
                parser,
                provider,
                cache,
            }),
        }
    }

    /// Create a search service for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be configured.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self::new(
            SearchProvider::from_config(config)?,
            QueryParser::default(),
        ))
    }

    /// Name of the active backend.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.inner.provider.name()
    }

    /// Parse a query without searching.
    #[must_use]
    pub fn parse_query(&self, query: &str) -> (ParsedQuery, SearchFilters) {
        let parsed = self.inner.parser.parse(&sanitize_query(query));
        let filters = QueryParser::build_search_filters(&parsed.parameters);
        (parsed, filters)
    }

    /// Drop every cached search response.
    pub fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Run a search, falling back to the Shoper API when the backend fails.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::EmptyQuery` for empty queries, or the Shoper
    /// error when the fallback fails too.
    #[instrument(skip(self, shoper), fields(provider = self.provider_name()))]
    pub async fn search(
        &self,
        request: &SearchRequest,
        shoper: &ShoperClient,
    ) -> Result<Arc<SearchResponse>, SearchError> {
        let query = sanitize_query(&request.query);
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let request = SearchRequest {
            query,
            limit: request.limit.max(1),
            page: request.page.max(1),
            category_id: request.category_id.filter(|id| *id > 0),
        };
        let key = SearchCacheKey {
            query: request.query.clone(),
            limit: request.limit,
            page: request.page,
            category_id: request.category_id,
        };

        if let Some(cached) = self.inner.cache.get(&key).await {
            return Ok(cached);
        }

        let backend = match &self.inner.provider {
            SearchProvider::Elasticsearch(es) => self.search_elasticsearch(es, &request).await,
            SearchProvider::Trieve(trieve) => search_trieve(trieve, shoper, &request).await,
        };

        match backend {
            Ok(response) => {
                let response = Arc::new(response);
                self.inner.cache.insert(key, Arc::clone(&response)).await;
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "Search backend failed, falling back to Shoper API");
                Ok(Arc::new(search_fallback(shoper, &request).await?))
            }
        }
    }

    async fn search_elasticsearch(
        &self,
        es: &ElasticsearchClient,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let parsed = self.inner.parser.parse(&request.query);
        let search = ProductSearch {
            text: parsed.cleaned_query.clone(),
            parsed: QueryParser::build_search_filters(&parsed.parameters),
            external: ExternalFilters {
                categories: request.category_id.iter().map(u64::to_string).collect(),
                ..ExternalFilters::default()
            },
            limit: Some(request.limit),
            page: Some(request.page),
        };

        let result = es.search_products(&request.query, &search).await?;

        let mut response = build_response(
            request,
            result.results,
            result.total_results,
            SearchMetadata {
                provider: "elasticsearch",
                enhanced_by_ai: false,
                took_ms: Some(result.metadata.took),
                fallback: false,
                timestamp: Utc::now(),
            },
        );
        response.aggregations = Some(result.aggregations);
        response.parsed = Some(parsed);
        Ok(response)
    }

    /// Name suggestions for a prefix. Only Elasticsearch supports this.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    pub async fn suggest(&self, prefix: &str) -> Result<Vec<String>, SearchError> {
        match &self.inner.provider {
            SearchProvider::Elasticsearch(es) => Ok(es.suggest(&sanitize_query(prefix)).await?),
            SearchProvider::Trieve(_) => Ok(Vec::new()),
        }
    }

    /// Index one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the document.
    pub async fn index_product(&self, product: &ShoperProduct) -> Result<bool, SearchError> {
        match &self.inner.provider {
            SearchProvider::Elasticsearch(es) => {
                Ok(es.index_product(&ProductDocument::from_product(product)).await?)
            }
            SearchProvider::Trieve(trieve) => {
                trieve.index_chunk(&to_trieve_chunk(product)).await?;
                Ok(true)
            }
        }
    }

    /// Remove one product from the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    pub async fn delete_product(&self, product_id: u64) -> Result<bool, SearchError> {
        let id = product_id.to_string();
        match &self.inner.provider {
            SearchProvider::Elasticsearch(es) => Ok(es.delete_product(&id).await?),
            SearchProvider::Trieve(trieve) => {
                trieve.delete_chunk(&id).await?;
                Ok(true)
            }
        }
    }

    /// Index the shop's catalogue, up to `limit` products.
    #[instrument(skip(self, shoper))]
    pub async fn reindex_all(&self, shoper: &ShoperClient, limit: u32) -> ReindexStats {
        let mut stats = ReindexStats::default();
        let limit = u64::from(limit);

        if let SearchProvider::Elasticsearch(es) = &self.inner.provider {
            if let Err(e) = es.ensure_index().await {
                stats.errors.push(format!("Failed to prepare index: {e}"));
                return stats;
            }
        }

        let mut page = 1;
        while stats.total < limit {
            let list = match shoper
                .list_products(&ListParams::page(REINDEX_PAGE_SIZE, page))
                .await
            {
                Ok(list) => list,
                Err(e) => {
                    stats.errors.push(format!("Failed to fetch page {page}: {e}"));
                    break;
                }
            };
            if list.list.is_empty() {
                break;
            }

            let remaining = usize::try_from(limit - stats.total).unwrap_or(usize::MAX);
            let products: Vec<ShoperProduct> = list.list.into_iter().take(remaining).collect();
            stats.total += products.len() as u64;

            match &self.inner.provider {
                SearchProvider::Elasticsearch(es) => {
                    let docs: Vec<ProductDocument> =
                        products.iter().map(ProductDocument::from_product).collect();
                    for (id, outcome) in es.bulk_index(&docs).await {
                        match outcome {
                            BulkOutcome::Indexed => stats.success += 1,
                            BulkOutcome::Failed { error } => {
                                stats.failed += 1;
                                stats.errors.push(format!("Product {id}: {error}"));
                            }
                            BulkOutcome::Pending => {
                                stats.failed += 1;
                                stats.errors.push(format!("Product {id}: not acknowledged"));
                            }
                        }
                    }
                }
                SearchProvider::Trieve(trieve) => {
                    for product in &products {
                        let chunk = to_trieve_chunk(product);
                        match trieve.index_chunk(&chunk).await {
                            Ok(()) => stats.success += 1,
                            Err(e) => {
                                stats.failed += 1;
                                stats
                                    .errors
                                    .push(format!("Product {}: {e}", chunk.tracking_id));
                            }
                        }
                    }
                }
            }

            if list.pages > 0 && u64::from(page) >= list.pages {
                break;
            }
            page += 1;
        }

        self.inner.cache.invalidate_all();
        info!(
            total = stats.total,
            success = stats.success,
            failed = stats.failed,
            "Reindex finished"
        );
        stats
    }

    /// Backend health.
    pub async fn health(&self) -> ProviderHealth {
        let mut datasets = None;
        let status = match &self.inner.provider {
            SearchProvider::Elasticsearch(es) => es.health().await.map_err(SearchError::from),
            SearchProvider::Trieve(trieve) => match trieve.health().await {
                Ok(()) => {
                    datasets = match trieve.datasets().await {
                        Ok(list) => list.as_ref().and_then(Value::as_array).map(Vec::len),
                        Err(e) => {
                            warn!(error = %e, "Failed to list Trieve datasets");
                            None
                        }
                    };
                    Ok("ok".to_string())
                }
                Err(e) => Err(SearchError::from(e)),
            },
        };

        ProviderHealth {
            provider: self.provider_name(),
            status: status.unwrap_or_else(|e| {
                warn!(error = %e, "Search backend health check failed");
                "unavailable".to_string()
            }),
            datasets,
        }
    }
}

async fn search_trieve(
    trieve: &TrieveClient,
    shoper: &ShoperClient,
    request: &SearchRequest,
) -> Result<SearchResponse, SearchError> {
    let started = Instant::now();
    let result = trieve
        .search(&request.query, request.page, request.limit, request.category_id)
        .await?;

    let mut items = Vec::with_capacity(result.hits.len());
    for hit in &result.hits {
        let id = hit
            .tracking_id
            .as_deref()
            .and_then(|id| id.parse::<u64>().ok())
            .or_else(|| hit.metadata.get("product_id").and_then(Value::as_u64));
        let Some(id) = id else {
            warn!("Trieve hit without a product id, skipping");
            continue;
        };

        match shoper.get_resource("products", id).await {
            Ok(product) => {
                let mut item = Value::clone(&product);
                if let Value::Object(map) = &mut item {
                    map.insert("relevance".to_string(), json!(hit.score));
                    map.insert("ai_enhanced".to_string(), json!(true));
                }
                items.push(item);
            }
            Err(e) => warn!(product_id = id, error = %e, "Failed to load product for Trieve hit"),
        }
    }

    let count = items.len() as u64;
    let mut response = build_response(
        request,
        items,
        count,
        SearchMetadata {
            provider: "trieve",
            enhanced_by_ai: true,
            took_ms: u64::try_from(started.elapsed().as_millis()).ok(),
            fallback: false,
            timestamp: Utc::now(),
        },
    );
    response.total_pages = trieve_total_pages(result.total_pages, response.total_pages);
    Ok(response)
}

/// Trieve pages by chunk, so its own page count wins over one derived from
/// the hydrated items of a single page.
const fn trieve_total_pages(reported: u64, derived: u64) -> u64 {
    if reported > 0 { reported } else { derived }
}

async fn search_fallback(
    shoper: &ShoperClient,
    request: &SearchRequest,
) -> Result<SearchResponse, SearchError> {
    let params = ListParams::page(request.limit.min(MAX_LIST_LIMIT), request.page).with_filter(
        "translations.name",
        json!({ "LIKE": format!("%{}%", request.query) }),
    );

    let value = shoper.list("products", &params).await?;
    let page: ListPage<Value> =
        serde_json::from_value(Value::clone(&value)).map_err(ShoperError::from)?;

    let mut response = build_response(
        request,
        fallback_rank(&request.query, page.list),
        page.count,
        SearchMetadata {
            provider: "shoper_api",
            enhanced_by_ai: false,
            took_ms: None,
            fallback: true,
            timestamp: Utc::now(),
        },
    );
    response.message = "Search completed using Shoper API fallback".to_string();
    Ok(response)
}

fn build_response(
    request: &SearchRequest,
    items: Vec<Value>,
    count: u64,
    metadata: SearchMetadata,
) -> SearchResponse {
    SearchResponse {
        status: "success",
        message: "Search completed".to_string(),
        query: request.query.clone(),
        items,
        count,
        page: request.page,
        limit: request.limit,
        category_id: request.category_id,
        total_pages: count.div_ceil(u64::from(request.limit.max(1))),
        aggregations: None,
        parsed: None,
        metadata,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::config::tests::test_config;

    use super::*;

    fn service() -> SearchService {
        SearchService::from_config(&test_config().search).unwrap()
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            limit: 10,
            page: 1,
            category_id: None,
        }
    }

    #[test]
    fn test_build_response_pages() {
        let metadata = SearchMetadata {
            provider: "elasticsearch",
            enhanced_by_ai: false,
            took_ms: None,
            fallback: false,
            timestamp: Utc::now(),
        };
        let response = build_response(&request("buty"), Vec::new(), 21, metadata);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.status, "success");

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("aggregations").is_none());
        assert!(json["metadata"].get("took_ms").is_none());
        assert_eq!(json["metadata"]["fallback"], false);
    }

    #[test]
    fn test_trieve_total_pages_prefers_reported() {
        let metadata = SearchMetadata {
            provider: "trieve",
            enhanced_by_ai: true,
            took_ms: None,
            fallback: false,
            timestamp: Utc::now(),
        };
        let mut request = request("buty");
        request.limit = 2;
        let items = vec![json!({"product_id": 1}), json!({"product_id": 2})];
        let response = build_response(&request, items, 2, metadata);
        assert_eq!(response.total_pages, 1);

        assert_eq!(trieve_total_pages(5, response.total_pages), 5);
        assert_eq!(trieve_total_pages(0, response.total_pages), 1);
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(service().provider_name(), "elasticsearch");
    }

    #[test]
    fn test_parse_query() {
        let (parsed, filters) = service().parse_query("<b>buty</b> adidas do 200 zł");
        assert_eq!(parsed.cleaned_query, "buty");
        assert_eq!(filters.brand.as_deref(), Some("adidas"));
        assert_eq!(filters.price_max, Some(200.0));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let shoper = ShoperClient::new(&test_config().shoper);
        let result = service().search(&request("  <p> </p> "), &shoper).await;
        assert!(matches!(result, Err(SearchError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_backend_and_fallback_failure_surfaces_shoper_error() {
        // Elasticsearch is unreachable and no Shoper token is set.
        let shoper = ShoperClient::new(&test_config().shoper);
        let result = service().search(&request("buty"), &shoper).await;
        assert!(matches!(
            result,
            Err(SearchError::Shoper(ShoperError::NoAccessToken))
        ));
    }

    #[tokio::test]
    async fn test_health_reports_unavailable_backend() {
        let health = service().health().await;
        assert_eq!(health.provider, "elasticsearch");
        assert_eq!(health.status, "unavailable");
    }

    #[tokio::test]
    async fn test_suggest_short_prefix() {
        assert!(service().suggest("ab").await.unwrap().is_empty());
    }
}
