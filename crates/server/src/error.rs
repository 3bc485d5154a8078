//! Unified error handling.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use shoper_search_core::{LinkValidationError, SettingsValidationError};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::search::SearchError;
use crate::shoper::ShoperError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Shoper API operation failed.
    #[error("Shoper error: {0}")]
    Shoper(#[from] ShoperError),

    /// Search backend failed.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Input failed validation; every failure is listed.
    #[error("Validation failed")]
    Validation(Vec<String>),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Search is switched off in the settings.
    #[error("Search is disabled")]
    SearchDisabled,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<Vec<LinkValidationError>> for AppError {
    fn from(errors: Vec<LinkValidationError>) -> Self {
        Self::Validation(errors.iter().map(ToString::to_string).collect())
    }
}

impl From<Vec<SettingsValidationError>> for AppError {
    fn from(errors: Vec<SettingsValidationError>) -> Self {
        Self::Validation(errors.iter().map(ToString::to_string).collect())
    }
}

fn shoper_status(err: &ShoperError) -> StatusCode {
    match err {
        ShoperError::NotFound(_) => StatusCode::NOT_FOUND,
        ShoperError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        ShoperError::NoAccessToken => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn shoper_message(err: &ShoperError) -> String {
    match err {
        ShoperError::NotFound(resource) => format!("Not found: {resource}"),
        ShoperError::RateLimited(secs) => format!("Rate limited, retry after {secs} seconds"),
        ShoperError::NoAccessToken => "Shop is not connected".to_string(),
        _ => "External service error".to_string(),
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Shoper(e) | Self::Search(SearchError::Shoper(e)) => shoper_status(e),
            Self::Search(SearchError::EmptyQuery) | Self::Validation(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Search(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::SearchDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error() && !matches!(self, Self::SearchDisabled)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Shoper(e) | Self::Search(SearchError::Shoper(e)) => shoper_message(e),
            Self::Search(SearchError::EmptyQuery) => "Search query is empty".to_string(),
            Self::Search(_) => "Search service error".to_string(),
            _ => self.to_string(),
        };

        let body = match self {
            Self::Validation(errors) => json!({
                "success": false,
                "message": message,
                "errors": errors,
            }),
            _ => json!({ "success": false, "message": message }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("Link not found".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("test".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::SearchDisabled.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::Search(SearchError::EmptyQuery).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Shoper(ShoperError::RateLimited(3)).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Shoper(ShoperError::Api {
                status: 500,
                message: "boom".to_string()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Search(SearchError::Shoper(ShoperError::NotFound("products/1".to_string())))
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Internal("test".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_errors() {
        let err: AppError = vec![
            LinkValidationError::NameRequired,
            LinkValidationError::UrlRequired,
        ]
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0], "Name is required");
        assert_eq!(body["errors"][1], "URL is required");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::Internal("secret stack".to_string()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");

        let response = AppError::Shoper(ShoperError::Unauthorized("token".to_string())).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "External service error");
    }
}
