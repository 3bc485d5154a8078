//! Health and status route handlers.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::SettingsRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

use super::APP_NAME;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /check
pub async fn check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "app": APP_NAME,
        "version": state.config().version,
        "search_provider": state.search().provider_name(),
    }))
}

/// GET /api/public-info
#[instrument(skip_all)]
pub async fn public_info(State(state): State<AppState>) -> Result<Json<Value>> {
    let settings = SettingsRepository::new(state.pool()).load().await?;

    Ok(Json(json!({
        "name": APP_NAME,
        "version": state.config().version,
        "search_enabled": settings.search_enabled,
        "provider": state.search().provider_name(),
    })))
}

/// Connection, search and configuration status.
///
/// GET /api/status
#[instrument(skip_all)]
pub async fn status(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Value>> {
    let settings = SettingsRepository::new(state.pool()).load().await?;
    let shoper = state.shoper();

    let shop_status = if !shoper.has_token().await {
        "not_connected"
    } else if shoper.shop_configuration().await.is_ok() {
        "connected"
    } else {
        "error"
    };
    let search = state.search().health().await;

    Ok(Json(json!({
        "shop_api": {
            "status": shop_status,
            "shop": shoper.shop_url().as_str(),
        },
        "search_api": {
            "provider": search.provider,
            "status": search.status,
            "enabled": settings.search_enabled,
            "datasets": search.datasets,
        },
        "config": {
            "search_enabled": settings.search_enabled,
            "result_limit": settings.result_limit,
        },
        "version": state.config().version,
        "timestamp": Utc::now(),
    })))
}

/// GET /api/shop
#[instrument(skip_all)]
pub async fn shop(State(state): State<AppState>, _admin: RequireAdmin) -> Json<Value> {
    Json(json!(state.shoper().shop_info().await))
}

/// GET /api/permissions
#[instrument(skip_all)]
pub async fn permissions(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Value>> {
    let admin_links = state.shoper().check_permissions().await?;
    Ok(Json(json!({ "admin_links": admin_links })))
}
