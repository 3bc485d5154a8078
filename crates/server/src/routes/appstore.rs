//! Shoper app store lifecycle hooks.
//!
//! The app store posts form-encoded requests to these endpoints when the
//! merchant installs, upgrades or removes the app.

use axum::{Form, Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::db::{AdminLinkRepository, LinkFilter, ShoperTokenRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;

use super::{APP_NAME, links::register_menu_items};

/// Static app manifest served to the app store.
#[must_use]
pub fn manifest_document(version: &str) -> Value {
    let dashboard = json!({ "pl": "Panel główny", "en": "Dashboard" });
    json!({
        "name": APP_NAME,
        "vendor": "ShoperAI",
        "version": version,
        "type": "integration",
        "main_page": { "url": "/admin/dashboard", "title": dashboard },
        "menu": {
            "placement": "left",
            "position": 100,
            "icon": "fa-search",
            "items": [
                { "url": "/admin/dashboard", "title": dashboard },
                { "url": "/admin/settings", "title": { "pl": "Ustawienia", "en": "Settings" } },
            ],
        },
        "privileges": {
            "shoper_ai_search": {
                "description": {
                    "pl": "Dostęp do Shoper AI Search",
                    "en": "Access to Shoper AI Search",
                },
            },
        },
    })
}

/// GET /appstore/manifest
pub async fn manifest(State(state): State<AppState>) -> Json<Value> {
    Json(manifest_document(&state.config().version))
}

/// Form posted on installation.
#[derive(Debug, Deserialize)]
pub struct InstallForm {
    pub shop: String,
    pub shop_url: Option<String>,
    pub auth_code: String,
}

/// Form posted on upgrade and uninstallation.
#[derive(Debug, Default, Deserialize)]
pub struct LifecycleForm {
    pub shop: Option<String>,
}

/// Install the app: exchange the code, persist the token and register the
/// admin integration.
///
/// POST /appstore/install
#[instrument(skip(state, form), fields(shop = %form.shop))]
pub async fn install(
    State(state): State<AppState>,
    Form(form): Form<InstallForm>,
) -> Result<Json<Value>> {
    if form.auth_code.trim().is_empty() {
        return Err(AppError::BadRequest("auth_code is required".to_string()));
    }
    if let Some(shop_url) = form.shop_url.as_deref() {
        if !shop_url.contains(state.shop_key()) {
            warn!(shop_url, "Install request names a different shop than configured");
        }
    }

    let shoper = state.shoper();
    let token = shoper.exchange_code(form.auth_code.trim()).await?;
    ShoperTokenRepository::new(state.pool())
        .save(state.shop_key(), &token)
        .await?;
    info!("Shoper token stored");

    if let Err(e) = shoper.register_permissions().await {
        warn!(error = %e, "Failed to register admin permissions");
    }
    if let Err(e) = shoper.register_app().await {
        warn!(error = %e, "Failed to register app entry");
    }

    let links = AdminLinkRepository::new(state.pool())
        .list(&LinkFilter::default())
        .await?;
    let (registered, failed) = register_menu_items(&state, &links).await;
    info!(registered, failed, "App installed");

    Ok(Json(json!({ "success": true })))
}

/// POST /appstore/upgrade
#[instrument(skip_all)]
pub async fn upgrade(
    State(state): State<AppState>,
    Form(form): Form<LifecycleForm>,
) -> Json<Value> {
    info!(shop = ?form.shop, "App upgrade requested");
    if let Err(e) = state.shoper().update_permissions().await {
        warn!(error = %e, "Failed to update admin permissions");
    }

    Json(json!({ "success": true }))
}

/// Uninstall the app: drop permissions, the stored token and all caches.
///
/// POST /appstore/uninstall
#[instrument(skip_all)]
pub async fn uninstall(
    State(state): State<AppState>,
    Form(form): Form<LifecycleForm>,
) -> Result<Json<Value>> {
    info!(shop = ?form.shop, "App uninstall requested");
    let shoper = state.shoper();

    if shoper.has_token().await {
        if let Err(e) = shoper.remove_permissions().await {
            warn!(error = %e, "Failed to remove admin permissions");
        }
    }

    ShoperTokenRepository::new(state.pool())
        .delete(state.shop_key())
        .await?;
    shoper.clear_token().await;
    shoper.clear_cache();
    state.search().clear_cache();
    info!("App uninstalled");

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_document() {
        let manifest = manifest_document("1.2.3");
        assert_eq!(manifest["name"], APP_NAME);
        assert_eq!(manifest["version"], "1.2.3");
        assert_eq!(manifest["menu"]["items"][1]["title"]["en"], "Settings");
        assert_eq!(manifest["menu"]["items"][0]["title"]["pl"], "Panel główny");
        assert!(manifest["privileges"].get("shoper_ai_search").is_some());
    }
}
