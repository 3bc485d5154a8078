//! Shoper OAuth token lifecycle.
//!
//! The token lives in memory on the [`ShoperClient`] and is mirrored to
//! `app.shoper_tokens` so restarts and the CLI can pick it up again.

use std::time::Duration;

use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{RepositoryError, ShoperTokenRepository};
use crate::shoper::ShoperClient;

/// How often the refresh task checks the token.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one refresh check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No token is loaded.
    NoToken,
    /// The token is still valid for long enough.
    Fresh,
    /// The token was refreshed and persisted.
    Refreshed,
    /// The refresh failed and the token was dropped.
    Dropped,
}

/// Load the stored token of the configured shop into the client.
///
/// Returns `true` if a token was found.
///
/// # Errors
///
/// Returns `RepositoryError` if the token cannot be read.
#[instrument(skip_all, fields(shop = %shop))]
pub async fn restore_token(
    pool: &PgPool,
    shoper: &ShoperClient,
    shop: &str,
) -> Result<bool, RepositoryError> {
    match ShoperTokenRepository::new(pool).get_by_shop(shop).await? {
        Some(token) => {
            shoper.set_token(token).await;
            info!("Restored Shoper token");
            Ok(true)
        }
        None => {
            warn!("No stored Shoper token, app is not installed yet");
            Ok(false)
        }
    }
}

/// Run one refresh check, persisting whatever changed.
#[instrument(skip_all, fields(shop = %shop))]
pub async fn refresh_once(pool: &PgPool, shoper: &ShoperClient, shop: &str) -> RefreshOutcome {
    if !shoper.has_token().await {
        return RefreshOutcome::NoToken;
    }

    let repo = ShoperTokenRepository::new(pool);

    match shoper.refresh_if_needed().await {
        Ok(None) => RefreshOutcome::Fresh,
        Ok(Some(token)) => {
            if let Err(e) = repo.save(shop, &token).await {
                error!(error = %e, "Failed to persist refreshed Shoper token");
            } else {
                info!(expires_at = %token.expires_at, "Shoper token refreshed");
            }
            RefreshOutcome::Refreshed
        }
        Err(e) => {
            error!(error = %e, "Shoper token could not be refreshed, app must be reinstalled");
            if let Err(e) = repo.delete(shop).await {
                error!(error = %e, "Failed to delete stale Shoper token");
            }
            RefreshOutcome::Dropped
        }
    }
}

/// Spawn the background task that keeps the Shoper token fresh.
pub fn spawn_token_refresh(pool: PgPool, shoper: ShoperClient, shop: String) {
    info!(interval_secs = REFRESH_INTERVAL.as_secs(), "Spawning Shoper token refresh task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            let outcome = refresh_once(&pool, &shoper, &shop).await;
            debug!(?outcome, "Token refresh check finished");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::config::tests::test_config;

    #[tokio::test]
    async fn test_refresh_without_token_is_a_no_op() {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shoper_search_test")
            .unwrap();
        let shoper = ShoperClient::new(&config.shoper);

        let outcome = refresh_once(&pool, &shoper, "demo.shoparena.pl").await;
        assert_eq!(outcome, RefreshOutcome::NoToken);
    }
}
