//! Admin session route handlers.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result};
use crate::middleware::{AdminSession, clear_admin_session, set_admin_session, verify_api_key};
use crate::state::AppState;

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub api_key: String,
}

/// Start an admin session.
///
/// POST /auth/session
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>> {
    if !verify_api_key(&state.config().admin_api_key, request.api_key.trim()) {
        warn!("Admin login rejected");
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    }

    let admin = AdminSession {
        shop: state.shop_key().to_string(),
        authenticated_at: Utc::now(),
    };
    set_admin_session(&session, &admin)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    info!(shop = %admin.shop, "Admin logged in");

    Ok(Json(json!({ "success": true, "shop": admin.shop })))
}

/// End the admin session.
///
/// DELETE /auth/session
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Json<Value>> {
    clear_admin_session(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(Json(json!({ "success": true })))
}
