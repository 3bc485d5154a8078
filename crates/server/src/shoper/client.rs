//! Shoper REST client implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use shoper_search_core::{AdminLink, ShopUrl};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::config::ShoperConfig;

use super::ShoperError;
use super::auth::{ShoperToken, TokenResponse};
use super::cache::{CacheKey, is_cacheable, normalize_endpoint, resource_root};
use super::types::{ListPage, ListParams, ShopInfo, ShoperProduct};

/// Module name under which the app registers its admin permissions.
const PERMISSION_MODULE: &str = "admin_links";

/// Permission set identifier used for update/removal.
const PERMISSION_SET: &str = "shoper_admin_links";

/// Request timeout for every Shoper call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of cached GET responses.
const CACHE_CAPACITY: u64 = 1000;

/// Client for the Shoper REST API.
///
/// GET responses are cached; successful writes drop every cached entry of
/// the same resource root.
#[derive(Clone)]
pub struct ShoperClient {
    inner: Arc<ShoperClientInner>,
}

struct ShoperClientInner {
    client: reqwest::Client,
    shop_url: ShopUrl,
    api_url: String,
    api_version: String,
    app_id: String,
    app_secret: SecretString,
    token: RwLock<Option<ShoperToken>>,
    cache: Cache<CacheKey, Arc<Value>>,
}

impl ShoperClient {
    /// Create a new Shoper API client.
    ///
    /// No token is set; call [`Self::set_token`] or [`Self::exchange_code`]
    /// before making API calls.
    #[must_use]
    pub fn new(config: &ShoperConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(config.cache_ttl)
            .support_invalidation_closures()
            .build();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client for Shoper");
                reqwest::Client::new()
            });

        Self {
            inner: Arc::new(ShoperClientInner {
                client,
                shop_url: config.shop_url.clone(),
                api_url: config.api_url.clone(),
                api_version: config.api_version.clone(),
                app_id: config.app_id.clone(),
                app_secret: config.app_secret.clone(),
                token: RwLock::new(None),
                cache,
            }),
        }
    }

    /// Get the shop URL.
    #[must_use]
    pub fn shop_url(&self) -> &ShopUrl {
        &self.inner.shop_url
    }

    /// Full URL of an endpoint.
    fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = normalize_endpoint(endpoint);
        if self.inner.api_version.is_empty() {
            format!("{}/{endpoint}", self.inner.api_url)
        } else {
            format!("{}/{}/{endpoint}", self.inner.api_url, self.inner.api_version)
        }
    }

    // =========================================================================
    // OAuth tokens
    // =========================================================================

    /// Exchange an authorization code (from the app-store install call) for
    /// a token pair. The token is kept in memory.
    ///
    /// # Errors
    ///
    /// Returns `ShoperError::OAuth` if the token endpoint rejects the code.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<ShoperToken, ShoperError> {
        let token = self
            .request_token(
                &[("grant_type", "authorization_code"), ("code", code)],
                None,
            )
            .await?;

        *self.inner.token.write().await = Some(token.clone());
        Ok(token)
    }

    /// Refresh the current token.
    ///
    /// # Errors
    ///
    /// Returns `ShoperError::NoAccessToken` when there is nothing to refresh,
    /// `ShoperError::OAuth` when the refresh is rejected.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<ShoperToken, ShoperError> {
        let refresh_token = self
            .inner
            .token
            .read()
            .await
            .as_ref()
            .ok_or(ShoperError::NoAccessToken)?
            .refresh_token
            .clone()
            .ok_or_else(|| ShoperError::OAuth("no refresh token available".to_string()))?;

        let token = self
            .request_token(
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.expose_secret()),
                ],
                Some(refresh_token.clone()),
            )
            .await?;

        *self.inner.token.write().await = Some(token.clone());
        Ok(token)
    }

    /// Refresh the token when it expires within ten minutes.
    ///
    /// Returns the new token when a refresh happened so the caller can
    /// persist it. A failed refresh logs the client out: the token is
    /// dropped and requests fail with `NoAccessToken` until the app is
    /// installed again.
    ///
    /// # Errors
    ///
    /// Returns the refresh error.
    pub async fn refresh_if_needed(&self) -> Result<Option<ShoperToken>, ShoperError> {
        let now = Utc::now();
        match self.inner.token.read().await.as_ref() {
            None => return Ok(None),
            Some(token) if !token.needs_refresh(now) => return Ok(None),
            Some(_) => {}
        }

        match self.refresh().await {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, dropping token");
                self.clear_token().await;
                Err(e)
            }
        }
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh: Option<SecretString>,
    ) -> Result<ShoperToken, ShoperError> {
        let url = format!("{}/oauth/token", self.inner.api_url);

        let response = self
            .inner
            .client
            .post(&url)
            .basic_auth(&self.inner.app_id, Some(self.inner.app_secret.expose_secret()))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ShoperError::OAuth(format!(
                "token request failed ({status}): {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let body: TokenResponse = response.json().await?;
        Ok(body.into_token(Utc::now(), previous_refresh))
    }

    /// Set the token directly (for loading from storage).
    pub async fn set_token(&self, token: ShoperToken) {
        *self.inner.token.write().await = Some(token);
    }

    /// Get the current token (if set).
    pub async fn get_token(&self) -> Option<ShoperToken> {
        self.inner.token.read().await.clone()
    }

    /// Check if we have a token.
    pub async fn has_token(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    /// Drop the current token.
    pub async fn clear_token(&self) {
        *self.inner.token.write().await = None;
    }

    async fn access_token(&self) -> Result<String, ShoperError> {
        self.inner
            .token
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.expose_secret().to_string())
            .ok_or(ShoperError::NoAccessToken)
    }

    // =========================================================================
    // Request execution
    // =========================================================================

    /// GET an endpoint, served from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not JSON.
    #[instrument(skip(self, query), fields(endpoint = %endpoint))]
    pub async fn get(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Arc<Value>, ShoperError> {
        if !is_cacheable(endpoint) {
            return self.get_uncached(endpoint, query).await;
        }

        let key = CacheKey::new(endpoint, query);
        if let Some(cached) = self.inner.cache.get(&key).await {
            debug!("Cache hit");
            return Ok(cached);
        }

        let value = self.get_uncached(endpoint, query).await?;
        self.inner.cache.insert(key, Arc::clone(&value)).await;
        Ok(value)
    }

    async fn get_uncached(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Arc<Value>, ShoperError> {
        self.send(Method::GET, endpoint, query, None)
            .await
            .map(Arc::new)
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ShoperError> {
        self.write(Method::POST, endpoint, Some(body)).await
    }

    /// PUT a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    pub async fn put(&self, endpoint: &str, body: &Value) -> Result<Value, ShoperError> {
        self.write(Method::PUT, endpoint, Some(body)).await
    }

    /// DELETE an endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn delete(&self, endpoint: &str) -> Result<Value, ShoperError> {
        self.write(Method::DELETE, endpoint, None).await
    }

    async fn write(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, ShoperError> {
        let value = self.send(method, endpoint, &[], body).await?;
        self.invalidate_resource(endpoint);
        Ok(value)
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ShoperError> {
        let access_token = self.access_token().await?;
        let url = self.endpoint_url(endpoint);

        let mut request = self
            .inner
            .client
            .request(method, &url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShoperError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShoperError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ShoperError::NotFound(normalize_endpoint(endpoint).to_string()));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Shoper API returned non-success status"
            );
            return Err(ShoperError::Api {
                status: status.as_u16(),
                message: error_message(&response_text),
            });
        }

        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse Shoper API response"
            );
            ShoperError::Parse(e)
        })
    }

    // =========================================================================
    // Cache management
    // =========================================================================

    /// Drop every cached entry sharing the endpoint's resource root.
    pub fn invalidate_resource(&self, endpoint: &str) {
        let root = resource_root(endpoint).to_string();
        if let Err(e) = self
            .inner
            .cache
            .invalidate_entries_if(move |key, _| key.root() == root)
        {
            warn!(error = %e, endpoint, "Failed to register cache invalidation");
        }
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// List a resource (`products`, `categories`, `orders`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self, resource: &str, params: &ListParams) -> Result<Arc<Value>, ShoperError> {
        self.get(resource, &params.to_query()).await
    }

    /// Get a single resource by ID.
    ///
    /// # Errors
    ///
    /// Returns `ShoperError::NotFound` if the resource does not exist.
    pub async fn get_resource(&self, resource: &str, id: u64) -> Result<Arc<Value>, ShoperError> {
        self.get(&format!("{}/{id}", normalize_endpoint(resource)), &[])
            .await
    }

    /// Categories a product belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn product_categories(&self, product_id: u64) -> Result<Arc<Value>, ShoperError> {
        self.get(&format!("products/{product_id}/categories"), &[])
            .await
    }

    /// Get a typed product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the product cannot be decoded.
    pub async fn product(&self, product_id: u64) -> Result<ShoperProduct, ShoperError> {
        let value = self.get_resource("products", product_id).await?;
        Ok(serde_json::from_value(Value::clone(&value))?)
    }

    /// List products as typed values.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the page cannot be decoded.
    pub async fn list_products(
        &self,
        params: &ListParams,
    ) -> Result<ListPage<ShoperProduct>, ShoperError> {
        let value = self.list("products", params).await?;
        Ok(serde_json::from_value(Value::clone(&value))?)
    }

    /// Basic information about the shop. Never fails: on error a fallback
    /// built from configuration is returned.
    #[instrument(skip(self))]
    pub async fn shop_info(&self) -> ShopInfo {
        match self.get("shop/info", &[]).await {
            Ok(value) => ShopInfo::from_response(
                &value,
                self.inner.shop_url.as_str(),
                &self.inner.api_version,
            ),
            Err(e) => {
                warn!(error = %e, "Failed to fetch shop info, using fallback");
                ShopInfo::fallback(self.inner.shop_url.as_str(), &self.inner.api_version)
            }
        }
    }

    /// Shop configuration (company data and general settings).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn shop_configuration(&self) -> Result<Arc<Value>, ShoperError> {
        self.get("shop_settings/configuration", &[]).await
    }

    /// Push the app's settings to Shoper.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_app_settings(&self, settings: &Value) -> Result<Value, ShoperError> {
        self.put("applications/settings", settings).await
    }

    // =========================================================================
    // Admin panel integration
    // =========================================================================

    /// Register the app's admin permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn register_permissions(&self) -> Result<Value, ShoperError> {
        self.post(
            "admin_permissions",
            &json!({
                "module": PERMISSION_MODULE,
                "name": PERMISSION_SET,
                "permissions": ["view", "edit"],
            }),
        )
        .await
    }

    /// Update the app's admin permissions after an upgrade.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_permissions(&self) -> Result<Value, ShoperError> {
        self.put(
            &format!("admin_permissions/{PERMISSION_SET}"),
            &json!({
                "module": PERMISSION_MODULE,
                "permissions": ["view", "edit"],
            }),
        )
        .await
    }

    /// Remove the app's admin permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn remove_permissions(&self) -> Result<Value, ShoperError> {
        self.delete(&format!("admin_permissions/{PERMISSION_SET}"))
            .await
    }

    /// Whether the current token may manage admin links.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn check_permissions(&self) -> Result<bool, ShoperError> {
        let value = self
            .get_uncached(
                "admin_permissions/check",
                &[("module".to_string(), PERMISSION_MODULE.to_string())],
            )
            .await?;

        Ok(match value.as_ref() {
            Value::Bool(allowed) => *allowed,
            other => other
                .get("allowed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Register an admin link as a menu item.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn register_menu_item(&self, link: &AdminLink) -> Result<Value, ShoperError> {
        self.post(
            "admin_menu/items",
            &json!({
                "name": link.name,
                "url": link.url,
                "placement": link.placement,
                "icon": "fa-link",
                "open_type": link.open_type,
            }),
        )
        .await
    }

    /// Register the app's dashboard and menu entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn register_app(&self) -> Result<Value, ShoperError> {
        self.put(
            "apps",
            &json!({
                "app": {
                    "dashboard": { "title": "AI Search", "url": "/admin/dashboard", "order": 1 },
                    "menu": {
                        "title": "AI Search",
                        "url": "/admin/dashboard",
                        "order": 100,
                        "icon": "fa-search"
                    }
                }
            }),
        )
        .await
    }
}

/// Best-effort error description from a Shoper error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "error", "message"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::config::tests::test_config;

    use super::*;

    fn client() -> ShoperClient {
        ShoperClient::new(&test_config().shoper)
    }

    #[test]
    fn test_endpoint_url() {
        let client = client();
        assert_eq!(
            client.endpoint_url("/products/5"),
            "https://demo.shoparena.pl/webapi/rest/products/5"
        );

        let mut config = test_config().shoper;
        config.api_version = "v2".to_string();
        let versioned = ShoperClient::new(&config);
        assert_eq!(
            versioned.endpoint_url("products"),
            "https://demo.shoparena.pl/webapi/rest/v2/products"
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"expired"}"#),
            "expired"
        );
        assert_eq!(error_message(r#"{"message":"bad"}"#), "bad");
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[tokio::test]
    async fn test_requests_without_token_fail_fast() {
        let client = client();
        assert!(!client.has_token().await);
        assert!(matches!(
            client.get("products", &[]).await,
            Err(ShoperError::NoAccessToken)
        ));
        assert!(matches!(client.refresh().await, Err(ShoperError::NoAccessToken)));
        assert!(client.refresh_if_needed().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_drops_token() {
        let mut config = test_config().shoper;
        config.api_url = "http://127.0.0.1:9/webapi/rest".to_string();
        let client = ShoperClient::new(&config);

        // Still valid for five minutes, so inside the refresh window.
        let token = TokenResponse::for_test("a", Some("r"), 300).into_token(Utc::now(), None);
        client.set_token(token).await;

        assert!(client.refresh_if_needed().await.is_err());
        assert!(!client.has_token().await);
        assert!(matches!(
            client.get("products", &[]).await,
            Err(ShoperError::NoAccessToken)
        ));
    }

    #[tokio::test]
    async fn test_fresh_token_is_not_refreshed() {
        let mut config = test_config().shoper;
        config.api_url = "http://127.0.0.1:9/webapi/rest".to_string();
        let client = ShoperClient::new(&config);

        let token = TokenResponse::for_test("a", Some("r"), 3600).into_token(Utc::now(), None);
        client.set_token(token).await;

        assert!(client.refresh_if_needed().await.unwrap().is_none());
        assert!(client.has_token().await);
    }

    #[tokio::test]
    async fn test_write_invalidates_resource_root() {
        let client = client();
        let cache = &client.inner.cache;

        let list = CacheKey::new("products", &[("page".to_string(), "1".to_string())]);
        let item = CacheKey::new("products/5", &[]);
        let other = CacheKey::new("categories", &[]);
        for key in [&list, &item, &other] {
            cache.insert(key.clone(), Arc::new(json!({}))).await;
        }

        client.invalidate_resource("products/5");
        cache.run_pending_tasks().await;

        assert!(cache.get(&list).await.is_none());
        assert!(cache.get(&item).await.is_none());
        assert!(cache.get(&other).await.is_some());
    }

    #[tokio::test]
    async fn test_get_served_from_cache() {
        let client = client();
        let key = CacheKey::new("shop/info", &[]);
        client
            .inner
            .cache
            .insert(key, Arc::new(json!({ "name": "Cached shop" })))
            .await;

        // No token is set, so only a cache hit can succeed.
        let info = client.shop_info().await;
        assert_eq!(info.name, "Cached shop");
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let client = client();
        let key = CacheKey::new("categories", &[]);
        client.inner.cache.insert(key.clone(), Arc::new(json!([]))).await;

        client.clear_cache();
        assert!(client.inner.cache.get(&key).await.is_none());
    }
}
