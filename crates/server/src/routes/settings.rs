//! Settings route handlers.
//!
//! Responses always carry the redacted settings; the API key never leaves
//! the server in full.

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};
use shoper_search_core::{AdminSettings, SettingsPatch};
use tracing::{info, instrument};

use crate::db::SettingsRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

fn settings_body(message: Option<&str>, settings: &AdminSettings) -> Json<Value> {
    let mut body = json!({ "success": true, "data": settings.redacted() });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    Json(body)
}

/// Settings pushed to the shop's application settings.
fn published_settings(settings: &AdminSettings) -> Value {
    json!({
        "search_enabled": settings.search_enabled,
        "result_limit": settings.result_limit,
        "replace_default_search": settings.replace_default_search,
        "include_descriptions": settings.include_descriptions,
        "include_attributes": settings.include_attributes,
        "model_name": settings.model_name,
    })
}

/// GET /api/settings
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Value>> {
    let settings = SettingsRepository::new(state.pool()).load().await?;
    Ok(settings_body(None, &settings))
}

/// Apply a partial update.
///
/// PUT /api/settings
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<Value>> {
    patch.validate()?;
    let repo = SettingsRepository::new(state.pool());
    let settings = repo.load().await?.merged(patch, Utc::now());
    repo.save(&settings).await?;

    // Result limits and enablement change what cached searches would return.
    state.search().clear_cache();
    info!("Settings updated");

    Ok(settings_body(Some("Settings saved"), &settings))
}

/// Restore the defaults.
///
/// POST /api/settings/reset
#[instrument(skip_all)]
pub async fn reset(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Value>> {
    let settings = AdminSettings::defaults_at(Utc::now());
    SettingsRepository::new(state.pool()).save(&settings).await?;
    state.search().clear_cache();
    info!("Settings reset to defaults");

    Ok(settings_body(Some("Settings reset"), &settings))
}

/// Pull the shop configuration into `shop_info`.
///
/// POST /api/settings/sync
#[instrument(skip_all)]
pub async fn sync(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Value>> {
    let configuration = state.shoper().shop_configuration().await?;

    let repo = SettingsRepository::new(state.pool());
    let mut settings = repo.load().await?;
    settings.shop_info = Some(configuration.as_ref().clone());
    settings.updated_at = Utc::now();
    repo.save(&settings).await?;

    Ok(settings_body(Some("Shop configuration synchronised"), &settings))
}

/// Push the settings to the shop's application settings.
///
/// POST /api/settings/publish
#[instrument(skip_all)]
pub async fn publish(State(state): State<AppState>, _admin: RequireAdmin) -> Result<Json<Value>> {
    let settings = SettingsRepository::new(state.pool()).load().await?;
    state
        .shoper()
        .update_app_settings(&published_settings(&settings))
        .await?;

    Ok(Json(json!({ "success": true, "message": "Settings published" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_settings_exclude_api_key() {
        let mut settings = AdminSettings::default();
        settings.api_key = "sk-very-secret".to_string();

        let published = published_settings(&settings);
        assert!(published.get("api_key").is_none());
        assert_eq!(published["result_limit"], 10);
    }

    #[test]
    fn test_settings_body_is_redacted() {
        let mut settings = AdminSettings::default();
        settings.api_key = "sk-very-secret".to_string();

        let Json(body) = settings_body(Some("Saved"), &settings);
        assert_eq!(body["data"]["api_key"], "**********cret");
        assert_eq!(body["message"], "Saved");
    }
}
