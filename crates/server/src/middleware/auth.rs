//! Admin authentication extractor.
//!
//! Admin routes accept either the `ADMIN_API_KEY` as a bearer token or a
//! session established through `POST /auth/session`.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use tower_sessions::Session;

use crate::state::AppState;

/// Session key holding the [`AdminSession`].
const ADMIN_SESSION_KEY: &str = "admin";

/// Admin login stored in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSession {
    /// Host of the shop the admin manages.
    pub shop: String,
    pub authenticated_at: DateTime<Utc>,
}

/// How the caller proved admin access.
#[derive(Debug, Clone)]
pub enum AdminPrincipal {
    ApiKey,
    Session(AdminSession),
}

/// Extractor that requires admin authentication.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(principal): RequireAdmin) -> impl IntoResponse {
///     "only admins see this"
/// }
/// ```
pub struct RequireAdmin(pub AdminPrincipal);

/// Error returned when a request lacks admin credentials.
#[derive(Debug)]
pub enum AdminRejection {
    /// No bearer key and no admin session.
    MissingCredentials,
    /// A bearer key was sent but does not match.
    InvalidApiKey,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::MissingCredentials => "Authentication required",
            Self::InvalidApiKey => "Invalid API key",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AdminRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(key) = bearer_token(parts) {
            return if verify_api_key(&state.config().admin_api_key, key) {
                Ok(Self(AdminPrincipal::ApiKey))
            } else {
                tracing::warn!(path = %parts.uri.path(), "Rejected admin API key");
                Err(AdminRejection::InvalidApiKey)
            };
        }

        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AdminRejection::MissingCredentials)?;

        let admin: AdminSession = session
            .get(ADMIN_SESSION_KEY)
            .await
            .ok()
            .flatten()
            .ok_or(AdminRejection::MissingCredentials)?;

        Ok(Self(AdminPrincipal::Session(admin)))
    }
}

/// Bearer token of the `Authorization` header, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Compare a presented key against the configured admin key in constant time.
///
/// Both values are run through HMAC-SHA256 keyed with the expected key, so
/// the comparison neither short-circuits nor leaks the key length.
#[must_use]
pub fn verify_api_key(expected: &SecretString, provided: &str) -> bool {
    let expected = expected.expose_secret().as_bytes();

    let Ok(mut reference) = Hmac::<Sha256>::new_from_slice(expected) else {
        return false;
    };
    reference.update(expected);
    let reference = reference.finalize().into_bytes();

    let Ok(mut candidate) = Hmac::<Sha256>::new_from_slice(expected) else {
        return false;
    };
    candidate.update(provided.as_bytes());
    candidate.verify_slice(&reference).is_ok()
}

/// Store the admin login in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_admin_session(
    session: &Session,
    admin: &AdminSession,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(ADMIN_SESSION_KEY, admin).await
}

/// Remove the admin login from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_admin_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<AdminSession>(ADMIN_SESSION_KEY).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("Zq8!vR2#kL9$wT4^mN7&pX1*cB6@hJ3%")
    }

    #[test]
    fn test_verify_api_key_accepts_exact_match() {
        assert!(verify_api_key(&key(), "Zq8!vR2#kL9$wT4^mN7&pX1*cB6@hJ3%"));
    }

    #[test]
    fn test_verify_api_key_rejects_others() {
        assert!(!verify_api_key(&key(), ""));
        assert!(!verify_api_key(&key(), "Zq8!vR2#kL9$wT4^mN7&pX1*cB6@hJ3"));
        assert!(!verify_api_key(&key(), "Zq8!vR2#kL9$wT4^mN7&pX1*cB6@hJ3%x"));
    }
}
