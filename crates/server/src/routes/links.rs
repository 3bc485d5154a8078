//! Admin link route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::{Value, json};
use shoper_search_core::{AdminLink, AdminLinkUpdate, LinkId, NewAdminLink};
use tracing::{info, instrument, warn};

use crate::db::{AdminLinkRepository, LinkFilter};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

fn link_not_found() -> AppError {
    AppError::NotFound("Link not found".to_string())
}

/// List links.
///
/// GET /api/admin-links?placement&object&action
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(filter): Query<LinkFilter>,
) -> Result<Json<Value>> {
    let links = AdminLinkRepository::new(state.pool()).list(&filter).await?;

    Ok(Json(json!({
        "success": true,
        "count": links.len(),
        "data": links,
    })))
}

/// Create a link.
///
/// POST /api/admin-links
#[instrument(skip(state, _admin, input))]
pub async fn create(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(input): Json<NewAdminLink>,
) -> Result<(StatusCode, Json<Value>)> {
    let link = input.into_link(Utc::now())?;
    AdminLinkRepository::new(state.pool()).create(&link).await?;
    info!(link_id = %link.id, "Admin link created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Link created",
            "data": link,
        })),
    ))
}

/// Show one link.
///
/// GET /api/admin-links/{id}
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let link = AdminLinkRepository::new(state.pool())
        .get(&LinkId::from(id))
        .await?
        .ok_or_else(link_not_found)?;

    Ok(Json(json!({ "success": true, "data": link })))
}

/// Partially update a link.
///
/// PUT /api/admin-links/{id}
#[instrument(skip(state, _admin, update))]
pub async fn update(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
    Json(update): Json<AdminLinkUpdate>,
) -> Result<Json<Value>> {
    let repo = AdminLinkRepository::new(state.pool());
    let current = repo
        .get(&LinkId::from(id))
        .await?
        .ok_or_else(link_not_found)?;

    let link = current.apply(update, Utc::now())?;
    if !repo.update(&link).await? {
        return Err(link_not_found());
    }
    info!(link_id = %link.id, "Admin link updated");

    Ok(Json(json!({
        "success": true,
        "message": "Link updated",
        "data": link,
    })))
}

/// Delete a link.
///
/// DELETE /api/admin-links/{id}
#[instrument(skip(state, _admin))]
pub async fn destroy(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = LinkId::from(id);
    if !AdminLinkRepository::new(state.pool()).delete(&id).await? {
        return Err(link_not_found());
    }
    info!(link_id = %id, "Admin link deleted");

    Ok(Json(json!({ "success": true, "message": "Link deleted" })))
}

/// Register every stored link as a Shoper admin menu item.
///
/// POST /api/admin-links/sync
#[instrument(skip_all)]
pub async fn sync(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Value>> {
    let links = AdminLinkRepository::new(state.pool())
        .list(&LinkFilter::default())
        .await?;

    let (registered, failed) = register_menu_items(&state, &links).await;

    Ok(Json(json!({
        "success": failed == 0,
        "registered": registered,
        "failed": failed,
    })))
}

/// Register links as admin menu items, returning `(registered, failed)`.
pub(crate) async fn register_menu_items(
    state: &AppState,
    links: &[AdminLink],
) -> (usize, usize) {
    let mut registered = 0;
    let mut failed = 0;

    for link in links {
        match state.shoper().register_menu_item(link).await {
            Ok(_) => registered += 1,
            Err(e) => {
                warn!(link_id = %link.id, error = %e, "Failed to register admin menu item");
                failed += 1;
            }
        }
    }

    (registered, failed)
}
