//! Application settings.
//!
//! A single [`AdminSettings`] record configures the AI search feature. Updates
//! arrive as a [`SettingsPatch`]; only the fields a patch sets are validated,
//! then the patch is merged into the stored record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Language models accepted in `model_name`.
pub const SUPPORTED_MODELS: &[&str] = &["gpt-4", "gpt-3.5-turbo"];

/// Inclusive bounds for `result_limit`.
const RESULT_LIMIT_RANGE: core::ops::RangeInclusive<u32> = 1..=100;

/// Inclusive bounds for `temperature`.
const TEMPERATURE_RANGE: core::ops::RangeInclusive<f64> = 0.0..=1.0;

/// A single validation failure for settings.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SettingsValidationError {
    #[error("API key is required")]
    ApiKeyRequired,
    #[error("API endpoint is not a valid URL")]
    InvalidEndpoint,
    #[error("Result limit must be between 1 and 100 (got {0})")]
    ResultLimitOutOfRange(u32),
    #[error("Temperature must be between 0 and 1 (got {0})")]
    TemperatureOutOfRange(f64),
    #[error("Unsupported model '{0}'")]
    UnsupportedModel(String),
}

/// AI search settings for the installed shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    pub api_key: String,
    pub api_endpoint: String,
    pub search_enabled: bool,
    pub result_limit: u32,
    pub model_name: String,
    pub temperature: f64,
    pub replace_default_search: bool,
    pub include_descriptions: bool,
    pub include_attributes: bool,
    /// Shop details pulled from the Shoper configuration endpoint.
    pub shop_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self::defaults_at(Utc::now())
    }
}

/// Partial settings update. Unknown keys in the request body are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub search_enabled: Option<bool>,
    pub result_limit: Option<u32>,
    pub model_name: Option<String>,
    pub temperature: Option<f64>,
    pub replace_default_search: Option<bool>,
    pub include_descriptions: Option<bool>,
    pub include_attributes: Option<bool>,
}

impl AdminSettings {
    /// Default settings stamped with the given time.
    #[must_use]
    pub fn defaults_at(now: DateTime<Utc>) -> Self {
        Self {
            api_key: String::new(),
            api_endpoint: "https://api.openai.com/v1".to_string(),
            search_enabled: false,
            result_limit: 10,
            model_name: "gpt-4".to_string(),
            temperature: 0.7,
            replace_default_search: true,
            include_descriptions: true,
            include_attributes: true,
            shop_info: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch and bump `updated_at`.
    #[must_use]
    pub fn merged(&self, patch: SettingsPatch, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();

        // A redacted key sent back unchanged keeps the stored secret.
        if let Some(v) = patch.api_key
            && v != mask_secret(&self.api_key)
        {
            next.api_key = v;
        }
        if let Some(v) = patch.api_endpoint {
            next.api_endpoint = v;
        }
        if let Some(v) = patch.search_enabled {
            next.search_enabled = v;
        }
        if let Some(v) = patch.result_limit {
            next.result_limit = v;
        }
        if let Some(v) = patch.model_name {
            next.model_name = v;
        }
        if let Some(v) = patch.temperature {
            next.temperature = v;
        }
        if let Some(v) = patch.replace_default_search {
            next.replace_default_search = v;
        }
        if let Some(v) = patch.include_descriptions {
            next.include_descriptions = v;
        }
        if let Some(v) = patch.include_attributes {
            next.include_attributes = v;
        }

        next.updated_at = now;
        next
    }

    /// Copy of the settings safe to return to clients.
    ///
    /// The API key is masked except for its last four characters.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api_key = mask_secret(&self.api_key);
        copy
    }
}

impl SettingsPatch {
    /// Validate the fields this patch sets, collecting every failure.
    ///
    /// Fields left unset are not checked, so enabling search does not
    /// require an API key to be supplied in the same request.
    ///
    /// # Errors
    ///
    /// Returns all validation failures found.
    pub fn validate(&self) -> Result<(), Vec<SettingsValidationError>> {
        let mut errors = Vec::new();

        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            errors.push(SettingsValidationError::ApiKeyRequired);
        }
        if let Some(endpoint) = &self.api_endpoint
            && Url::parse(endpoint).is_err()
        {
            errors.push(SettingsValidationError::InvalidEndpoint);
        }
        if let Some(limit) = self.result_limit
            && !RESULT_LIMIT_RANGE.contains(&limit)
        {
            errors.push(SettingsValidationError::ResultLimitOutOfRange(limit));
        }
        if let Some(temperature) = self.temperature
            && !TEMPERATURE_RANGE.contains(&temperature)
        {
            errors.push(SettingsValidationError::TemperatureOutOfRange(
                temperature,
            ));
        }
        if let Some(model) = &self.model_name
            && !SUPPORTED_MODELS.contains(&model.as_str())
        {
            errors.push(SettingsValidationError::UnsupportedModel(model.clone()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> AdminSettings {
        AdminSettings {
            api_key: "sk-test-1234567890".to_string(),
            ..AdminSettings::default()
        }
    }

    fn patch(json: &str) -> SettingsPatch {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = AdminSettings::default();
        assert!(!settings.search_enabled);
        assert_eq!(settings.result_limit, 10);
        assert_eq!(settings.model_name, "gpt-4");
        assert!((settings.temperature - 0.7).abs() < f64::EPSILON);
        assert!(settings.replace_default_search);
    }

    #[test]
    fn test_enable_search_on_defaults() {
        let update = patch(r#"{"search_enabled": true}"#);
        assert!(update.validate().is_ok());

        let merged = AdminSettings::default().merged(update, Utc::now());
        assert!(merged.search_enabled);
        assert!(merged.api_key.is_empty());
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let errors = patch(r#"{"api_key": "   "}"#).validate().unwrap_err();
        assert_eq!(errors, vec![SettingsValidationError::ApiKeyRequired]);
    }

    #[test]
    fn test_validate_ranges_and_model() {
        let update = patch(
            r#"{"result_limit": 0, "temperature": 1.5, "model_name": "llama", "api_endpoint": "nope"}"#,
        );
        let errors = update.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&SettingsValidationError::InvalidEndpoint));
        assert!(errors.contains(&SettingsValidationError::ResultLimitOutOfRange(0)));
        assert!(errors.contains(&SettingsValidationError::UnsupportedModel(
            "llama".to_string()
        )));

        let ok = patch(r#"{"result_limit": 100, "temperature": 0.0, "model_name": "gpt-3.5-turbo"}"#);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_merged_applies_known_fields_only() {
        let base = valid();
        let later = base.updated_at + chrono::Duration::minutes(1);
        let update = patch(r#"{"search_enabled": true, "result_limit": 25, "bogus": 1}"#);

        let merged = base.merged(update, later);
        assert!(merged.search_enabled);
        assert_eq!(merged.result_limit, 25);
        assert_eq!(merged.api_key, base.api_key);
        assert_eq!(merged.created_at, base.created_at);
        assert_eq!(merged.updated_at, later);
    }

    #[test]
    fn test_redacted_body_sent_back_keeps_secret() {
        let stored = AdminSettings {
            api_key: "sk-real-secret-9876".to_string(),
            ..AdminSettings::default()
        };
        let shown = serde_json::to_value(stored.redacted()).unwrap();
        let update: SettingsPatch = serde_json::from_value(shown).unwrap();
        assert!(update.validate().is_ok());

        let merged = stored.merged(update, Utc::now());
        assert_eq!(merged.api_key, "sk-real-secret-9876");

        let merged = stored.merged(patch(r#"{"api_key": "sk-new-key-0001"}"#), Utc::now());
        assert_eq!(merged.api_key, "sk-new-key-0001");
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let redacted = valid().redacted();
        assert_eq!(redacted.api_key, "**************7890");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_deserialize_missing_fields_uses_defaults() {
        let settings: AdminSettings = serde_json::from_str(r#"{"search_enabled": true}"#).unwrap();
        assert!(settings.search_enabled);
        assert_eq!(settings.result_limit, 10);
    }
}
