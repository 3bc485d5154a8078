//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::search::{SearchError, SearchService};
use crate::shoper::ShoperClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and API clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    shoper: ShoperClient,
    search: SearchService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured search backend cannot be built.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, SearchError> {
        let shoper = ShoperClient::new(&config.shoper);
        let search = SearchService::from_config(&config.search)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shoper,
                search,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Shoper API client.
    #[must_use]
    pub fn shoper(&self) -> &ShoperClient {
        &self.inner.shoper
    }

    /// Get a reference to the search service.
    #[must_use]
    pub fn search(&self) -> &SearchService {
        &self.inner.search
    }

    /// Host of the connected shop, used as the token key.
    #[must_use]
    pub fn shop_key(&self) -> &str {
        self.inner.config.shoper.shop_url.host()
    }
}
