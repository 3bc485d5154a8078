//! Shoper OAuth token repository.
//!
//! The refresh task and the app-store install hook write here; the server
//! and CLI restore the token at start-up.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use crate::shoper::ShoperToken;

use super::RepositoryError;

/// Internal row type for `PostgreSQL` queries.
#[derive(sqlx::FromRow)]
struct ShoperTokenRow {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
    scope: Option<String>,
}

impl From<ShoperTokenRow> for ShoperToken {
    fn from(row: ShoperTokenRow) -> Self {
        Self {
            access_token: SecretString::from(row.access_token),
            refresh_token: row.refresh_token.map(SecretString::from),
            expires_at: row.expires_at,
            scope: row.scope,
        }
    }
}

/// Repository for Shoper OAuth token database operations.
pub struct ShoperTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShoperTokenRepository<'a> {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the token stored for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_shop(&self, shop: &str) -> Result<Option<ShoperToken>, RepositoryError> {
        let row = sqlx::query_as::<_, ShoperTokenRow>(
            r"
            SELECT access_token, refresh_token, expires_at, scope
            FROM app.shoper_tokens
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShoperToken::from))
    }

    /// Save or replace the token of a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(&self, shop: &str, token: &ShoperToken) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO app.shoper_tokens (shop, access_token, refresh_token, expires_at, scope)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (shop) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                scope = EXCLUDED.scope,
                updated_at = NOW()
            ",
        )
        .bind(shop)
        .bind(token.access_token.expose_secret())
        .bind(token.refresh_token.as_ref().map(|t| t.expose_secret().to_string()))
        .bind(token.expires_at)
        .bind(token.scope.as_deref())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete the token of a shop. Returns `false` if none was stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM app.shoper_tokens WHERE shop = $1")
            .bind(shop)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
