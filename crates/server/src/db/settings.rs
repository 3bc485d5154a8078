//! Settings database operations.
//!
//! The search settings are one JSONB document under the key `search`.

use chrono::Utc;
use serde_json::Value as JsonValue;
use shoper_search_core::AdminSettings;
use sqlx::PgPool;

use super::RepositoryError;

/// Key of the search settings document.
const SEARCH_SETTINGS_KEY: &str = "search";

/// Repository for application settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the stored settings, or the defaults when none are stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored document does
    /// not decode.
    pub async fn load(&self) -> Result<AdminSettings, RepositoryError> {
        let value: Option<JsonValue> =
            sqlx::query_scalar("SELECT value FROM app.settings WHERE key = $1")
                .bind(SEARCH_SETTINGS_KEY)
                .fetch_optional(self.pool)
                .await?;

        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| RepositoryError::DataCorruption(format!("settings: {e}"))),
            None => Ok(AdminSettings::defaults_at(Utc::now())),
        }
    }

    /// Store the settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(&self, settings: &AdminSettings) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(settings)
            .map_err(|e| RepositoryError::DataCorruption(format!("settings: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO app.settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(SEARCH_SETTINGS_KEY)
        .bind(value)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
