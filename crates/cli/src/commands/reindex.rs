//! Catalogue reindex command.
//!
//! # Usage
//!
//! ```bash
//! ss-cli reindex --limit 500
//! ```
//!
//! Uses the server configuration and the Shoper token stored at install time.

use shoper_search_server::config::{ConfigError, ServerConfig};
use shoper_search_server::db::{RepositoryError, create_pool};
use shoper_search_server::search::{ReindexStats, SearchError, SearchService};
use shoper_search_server::services::restore_token;
use shoper_search_server::shoper::ShoperClient;
use thiserror::Error;

/// Errors that can occur while reindexing.
#[derive(Debug, Error)]
pub enum ReindexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("No Shoper token stored for {0}; install the app first")]
    NotInstalled(String),
}

/// Reindex up to `limit` products.
///
/// # Errors
///
/// Returns an error if the configuration, database or token are unavailable.
/// Per-product failures are reported in the stats instead.
pub async fn run(limit: u32) -> Result<ReindexStats, ReindexError> {
    let config = ServerConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    let shoper = ShoperClient::new(&config.shoper);
    let shop = config.shoper.shop_url.host();
    if !restore_token(&pool, &shoper, shop).await? {
        return Err(ReindexError::NotInstalled(shop.to_string()));
    }

    let search = SearchService::from_config(&config.search)?;
    tracing::info!(provider = search.provider_name(), limit, "Reindexing catalogue...");

    let stats = search.reindex_all(&shoper, limit).await;
    for error in &stats.errors {
        tracing::warn!("{error}");
    }
    tracing::info!(
        total = stats.total,
        success = stats.success,
        failed = stats.failed,
        "Reindex complete!"
    );

    Ok(stats)
}
