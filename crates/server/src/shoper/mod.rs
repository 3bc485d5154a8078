//! Shoper REST API client.
//!
//! # Architecture
//!
//! - Plain REST over `reqwest`, bearer-token authenticated
//! - GET responses are cached in-memory via `moka` (1 hour TTL by default)
//! - Writes invalidate cached entries of the same resource root through a
//!   structured cache key rather than key-pattern scans
//! - OAuth tokens are exchanged, refreshed, and held in memory; persistence
//!   is the caller's job (see `db::ShoperTokenRepository`)
//!
//! # Example
//!
//! ```rust,ignore
//! use shoper_search_server::shoper::{ListParams, ShoperClient};
//!
//! let client = ShoperClient::new(&config.shoper);
//! client.set_token(token).await;
//!
//! let products = client.list("products", &ListParams::default()).await?;
//! let info = client.shop_info().await;
//! ```

mod auth;
mod cache;
mod client;
pub mod types;

pub use auth::ShoperToken;
pub use cache::CacheKey;
pub use client::ShoperClient;
pub use types::{ListParams, ShopInfo, ShoperProduct};

use thiserror::Error;

/// Errors that can occur when interacting with the Shoper API.
#[derive(Debug, Error)]
pub enum ShoperError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shoper.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The access token was rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Non-success response from the API.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description from the response body.
        message: String,
    },

    /// No access token has been set (app not installed yet).
    #[error("No access token available")]
    NoAccessToken,

    /// Token exchange or refresh failed.
    #[error("OAuth error: {0}")]
    OAuth(String),
}
