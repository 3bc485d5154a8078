//! Shoper API proxy route handlers.
//!
//! Every list endpoint accepts `limit` (default 25), `page` (default 1) and
//! any number of `filter_<name>=<value>` parameters.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::shoper::ListParams;
use crate::state::AppState;

async fn list_resource(
    state: &AppState,
    resource: &str,
    query: &HashMap<String, String>,
) -> Result<Response> {
    let value = state
        .shoper()
        .list(resource, &ListParams::from_query(query))
        .await?;
    Ok(Json(value.as_ref()).into_response())
}

async fn get_resource(state: &AppState, resource: &str, id: u64) -> Result<Response> {
    let value = state.shoper().get_resource(resource, id).await?;
    Ok(Json(value.as_ref()).into_response())
}

/// GET /api/shoper/products
#[instrument(skip(state, _admin))]
pub async fn list_products(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response> {
    list_resource(&state, "products", &query).await
}

/// GET /api/shoper/products/{id}
#[instrument(skip(state, _admin))]
pub async fn get_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<u64>,
) -> Result<Response> {
    get_resource(&state, "products", id).await
}

/// GET /api/shoper/products/{id}/categories
#[instrument(skip(state, _admin))]
pub async fn product_categories(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<u64>,
) -> Result<Response> {
    let value = state.shoper().product_categories(id).await?;
    Ok(Json(value.as_ref()).into_response())
}

/// GET /api/shoper/categories
#[instrument(skip(state, _admin))]
pub async fn list_categories(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response> {
    list_resource(&state, "categories", &query).await
}

/// GET /api/shoper/categories/{id}
#[instrument(skip(state, _admin))]
pub async fn get_category(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<u64>,
) -> Result<Response> {
    get_resource(&state, "categories", id).await
}

/// GET /api/shoper/orders
#[instrument(skip(state, _admin))]
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response> {
    list_resource(&state, "orders", &query).await
}

/// GET /api/shoper/orders/{id}
#[instrument(skip(state, _admin))]
pub async fn get_order(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<u64>,
) -> Result<Response> {
    get_resource(&state, "orders", id).await
}

/// GET /api/shoper/customers
#[instrument(skip(state, _admin))]
pub async fn list_customers(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response> {
    list_resource(&state, "customers", &query).await
}

/// GET /api/shoper/customers/{id}
#[instrument(skip(state, _admin))]
pub async fn get_customer(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<u64>,
) -> Result<Response> {
    get_resource(&state, "customers", id).await
}
