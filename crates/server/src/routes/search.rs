//! Product search route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::db::SettingsRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::search::{DEFAULT_REINDEX_LIMIT, ReindexStats, SearchRequest};
use crate::state::AppState;

/// Largest page size a client may ask for.
const MAX_SEARCH_LIMIT: u32 = 100;

/// Query parameters of `GET /api/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub category: Option<u64>,
}

impl SearchParams {
    /// Build a search request, using `default_limit` when no limit is given.
    #[must_use]
    pub fn into_request(self, default_limit: u32) -> SearchRequest {
        SearchRequest {
            query: self.q.unwrap_or_default(),
            limit: self.limit.unwrap_or(default_limit).clamp(1, MAX_SEARCH_LIMIT),
            page: self.page.unwrap_or(1).max(1),
            category_id: self.category.filter(|&id| id != 0),
        }
    }
}

/// Search products.
///
/// GET /api/search?q&limit&page&category
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response> {
    let settings = SettingsRepository::new(state.pool()).load().await?;
    if !settings.search_enabled {
        return Err(AppError::SearchDisabled);
    }

    let request = params.into_request(settings.result_limit);
    let response = state.search().search(&request, state.shoper()).await?;

    Ok(Json(response.as_ref()).into_response())
}

/// Query parameter holding free text.
#[derive(Debug, Deserialize)]
pub struct TextParam {
    #[serde(default)]
    pub q: String,
}

/// Product name suggestions for a prefix.
///
/// GET /api/search/suggest?q
#[instrument(skip(state))]
pub async fn suggest(
    State(state): State<AppState>,
    Query(TextParam { q }): Query<TextParam>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.search().suggest(&q).await?))
}

/// Preview how a query is parsed.
///
/// GET /api/search/parse?q
pub async fn parse(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(TextParam { q }): Query<TextParam>,
) -> Json<Value> {
    let (parsed, filters) = state.search().parse_query(&q);
    Json(json!({ "parsed": parsed, "filters": filters }))
}

/// Drop cached search responses and Shoper API responses.
///
/// DELETE /api/search/cache
#[instrument(skip_all)]
pub async fn clear_cache(State(state): State<AppState>, _admin: RequireAdmin) -> Json<Value> {
    state.search().clear_cache();
    state.shoper().clear_cache();
    info!("Search and Shoper caches cleared");

    Json(json!({ "success": true, "message": "Cache cleared" }))
}

/// Body of `POST /api/search/reindex`.
#[derive(Debug, Default, Deserialize)]
pub struct ReindexBody {
    pub limit: Option<u32>,
}

/// Reindex the catalogue.
///
/// POST /api/search/reindex
#[instrument(skip(state, _admin))]
pub async fn reindex(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    body: Option<Json<ReindexBody>>,
) -> Json<ReindexStats> {
    let limit = body
        .and_then(|Json(body)| body.limit)
        .unwrap_or(DEFAULT_REINDEX_LIMIT);

    Json(state.search().reindex_all(state.shoper(), limit).await)
}

/// Index one product.
///
/// POST /api/search/index/{product_id}
#[instrument(skip(state, _admin))]
pub async fn index_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(product_id): Path<u64>,
) -> Result<Json<Value>> {
    let product = state.shoper().product(product_id).await?;
    let indexed = state.search().index_product(&product).await?;

    Ok(Json(json!({
        "success": indexed,
        "product_id": product_id,
        "indexed": indexed,
    })))
}

/// Remove one product from the index.
///
/// DELETE /api/search/index/{product_id}
#[instrument(skip(state, _admin))]
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(product_id): Path<u64>,
) -> Result<Json<Value>> {
    let deleted = state.search().delete_product(product_id).await?;

    Ok(Json(json!({
        "success": true,
        "product_id": product_id,
        "deleted": deleted,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = SearchParams {
            q: Some("buty".to_string()),
            ..SearchParams::default()
        }
        .into_request(10);

        assert_eq!(request.query, "buty");
        assert_eq!(request.limit, 10);
        assert_eq!(request.page, 1);
        assert_eq!(request.category_id, None);
    }

    #[test]
    fn test_request_clamps_and_normalises() {
        let request = SearchParams {
            q: None,
            limit: Some(500),
            page: Some(0),
            category: Some(0),
        }
        .into_request(10);

        assert_eq!(request.query, "");
        assert_eq!(request.limit, MAX_SEARCH_LIMIT);
        assert_eq!(request.page, 1);
        assert_eq!(request.category_id, None);

        let request = SearchParams {
            limit: Some(0),
            category: Some(7),
            ..SearchParams::default()
        }
        .into_request(10);
        assert_eq!(request.limit, 1);
        assert_eq!(request.category_id, Some(7));
    }
}
