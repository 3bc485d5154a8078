//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness check (database)
//! GET  /check                           - App identity and search provider
//!
//! # App store hooks
//! GET  /appstore/manifest               - App manifest
//! POST /appstore/install                - Exchange auth code, register integration
//! POST /appstore/upgrade                - Update permissions
//! POST /appstore/uninstall              - Drop permissions, token and caches
//!
//! # Admin session (auth rate limiter)
//! POST   /auth/session                  - Log in with the admin API key
//! DELETE /auth/session                  - Log out
//!
//! # Public API (API rate limiter)
//! GET  /api/search                      - Product search
//! GET  /api/search/suggest              - Name suggestions
//! GET  /api/public-info                 - Name, version, search availability
//!
//! # Admin API (requires admin, API rate limiter)
//! GET    /api/status                    - Shop, search and config status
//! GET    /api/shop                      - Shop info
//! GET    /api/permissions               - Admin link permission check
//! GET    /api/search/parse              - Query parser preview
//! DELETE /api/search/cache              - Clear search and Shoper caches
//! POST   /api/search/reindex            - Reindex the catalogue
//! POST   /api/search/index/{product_id} - Index one product
//! DELETE /api/search/index/{product_id} - Remove one product
//! GET    /api/shoper/...                - Shoper API proxy
//! *      /api/admin-links[/{id}|/sync]  - Admin link CRUD
//! *      /api/settings[/reset|/sync|/publish]
//! ```

pub mod appstore;
pub mod auth;
pub mod links;
pub mod search;
pub mod settings;
pub mod shoper;
pub mod status;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Name the app reports about itself.
pub const APP_NAME: &str = "Shoper AI Search";

/// Create the search routes router.
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(search::search))
        .route("/suggest", get(search::suggest))
        .route("/parse", get(search::parse))
        .route("/cache", delete(search::clear_cache))
        .route("/reindex", post(search::reindex))
        .route(
            "/index/{product_id}",
            post(search::index_product).delete(search::delete_product),
        )
}

/// Create the Shoper API proxy router.
pub fn shoper_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(shoper::list_products))
        .route("/products/{id}", get(shoper::get_product))
        .route("/products/{id}/categories", get(shoper::product_categories))
        .route("/categories", get(shoper::list_categories))
        .route("/categories/{id}", get(shoper::get_category))
        .route("/orders", get(shoper::list_orders))
        .route("/orders/{id}", get(shoper::get_order))
        .route("/customers", get(shoper::list_customers))
        .route("/customers/{id}", get(shoper::get_customer))
}

/// Create the admin link routes router.
pub fn link_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(links::index).post(links::create))
        .route("/sync", post(links::sync))
        .route(
            "/{id}",
            get(links::show).put(links::update).delete(links::destroy),
        )
}

/// Create the settings routes router.
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(settings::show).put(settings::update))
        .route("/reset", post(settings::reset))
        .route("/sync", post(settings::sync))
        .route("/publish", post(settings::publish))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::status))
        .route("/shop", get(status::shop))
        .route("/public-info", get(status::public_info))
        .route("/permissions", get(status::permissions))
        .nest("/search", search_routes())
        .nest("/shoper", shoper_routes())
        .nest("/admin-links", link_routes())
        .nest("/settings", settings_routes())
}

/// Create the app store hook router.
pub fn appstore_routes() -> Router<AppState> {
    Router::new()
        .route("/manifest", get(appstore::manifest))
        .route("/install", post(appstore::install))
        .route("/upgrade", post(appstore::upgrade))
        .route("/uninstall", post(appstore::uninstall))
}

/// Create the admin session router.
pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/session", post(auth::login).delete(auth::logout))
}

/// Create all routes of the app.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(status::health))
        .route("/health/ready", get(status::readiness))
        .route("/check", get(status::check))
        .nest("/appstore", appstore_routes())
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api_routes().layer(api_rate_limiter()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::tests::test_config;
    use crate::state::AppState;

    const ADMIN_KEY: &str = "Zq8!vR2#kL9$wT4^mN7&pX1*cB6@hJ3%";

    /// Router over a pool that never connects; only database-free paths are
    /// exercised.
    fn test_app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shoper_search_test")
            .unwrap();
        crate::app(AppState::new(test_config(), pool).unwrap())
    }

    fn get(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.10")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_check_reports_provider() {
        let response = test_app()
            .oneshot(get("/check").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["app"], super::APP_NAME);
        assert_eq!(body["search_provider"], "elasticsearch");
    }

    #[tokio::test]
    async fn test_manifest() {
        let response = test_app()
            .oneshot(get("/appstore/manifest").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["version"], "0.1.0-test");
    }

    #[tokio::test]
    async fn test_admin_route_requires_credentials() {
        let response = test_app()
            .oneshot(get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_admin_route_rejects_wrong_key() {
        let response = test_app()
            .oneshot(
                get("/api/search/parse?q=buty")
                    .header(header::AUTHORIZATION, "Bearer not-the-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid API key");
    }

    #[tokio::test]
    async fn test_parse_preview() {
        let response = test_app()
            .oneshot(
                get("/api/search/parse?q=buty%20marka%20nike%20do%20200%20z%C5%82")
                    .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["parsed"]["original_query"], "buty marka nike do 200 zł");
        assert_eq!(body["filters"]["brand"], "nike");
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/search/cache")
                    .header("x-forwarded-for", "203.0.113.10")
                    .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_short_suggest_prefix_is_empty() {
        let response = test_app()
            .oneshot(get("/api/search/suggest?q=ab").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_key() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/session")
                    .header("x-forwarded-for", "203.0.113.11")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"api_key":"wrong"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn admin_json(method: &str, uri: &str, body: &str) -> Request<Body> {
        get(uri)
            .method(method)
            .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_link_lists_validation_errors() {
        let response = test_app()
            .oneshot(admin_json(
                "POST",
                "/api/admin-links",
                r#"{"name": " ", "url": "", "openType": "popup"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Validation failed");
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], "Name is required");
        assert_eq!(errors[1], "URL is required");
    }

    #[tokio::test]
    async fn test_settings_update_rejects_invalid_fields() {
        let response = test_app()
            .oneshot(admin_json(
                "PUT",
                "/api/settings",
                r#"{"result_limit": 500, "model_name": "llama"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = test_app()
            .oneshot(get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
