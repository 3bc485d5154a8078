//! OAuth token types for the Shoper API.

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::Deserialize;

/// Refresh tokens this many seconds before they expire.
pub(crate) const REFRESH_THRESHOLD_SECS: i64 = 600;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Longest lifetime accepted from the token endpoint (one year).
const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 3600;

/// An OAuth token pair for one shop.
///
/// Implements `Debug` manually to redact both tokens.
#[derive(Clone)]
pub struct ShoperToken {
    /// Bearer token for API calls.
    pub access_token: SecretString,
    /// Token used to obtain a new access token.
    pub refresh_token: Option<SecretString>,
    /// When the access token stops working.
    pub expires_at: DateTime<Utc>,
    /// Granted scope, if reported.
    pub scope: Option<String>,
}

impl std::fmt::Debug for ShoperToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShoperToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

impl ShoperToken {
    /// Whether the token expires within the refresh threshold.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= TimeDelta::seconds(REFRESH_THRESHOLD_SECS)
    }

    /// Whether the token has already expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Response body of `oauth/token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a token, keeping the previous refresh token when the
    /// response does not rotate it.
    pub(crate) fn into_token(
        self,
        now: DateTime<Utc>,
        previous_refresh: Option<SecretString>,
    ) -> ShoperToken {
        let expires_in = self
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .clamp(0, MAX_EXPIRES_IN_SECS);
        let expires_at = TimeDelta::try_seconds(expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(now);

        ShoperToken {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from).or(previous_refresh),
            expires_at,
            scope: self.scope,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(access: &str, refresh: Option<&str>, expires_in: i64) -> Self {
        Self {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in: Some(expires_in),
            scope: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn response(json: &str) -> TokenResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_into_token_computes_expiry() {
        let now = Utc::now();
        let token = response(r#"{"access_token":"a","refresh_token":"r","expires_in":2592000}"#)
            .into_token(now, None);

        assert_eq!(token.access_token.expose_secret(), "a");
        assert_eq!(token.refresh_token.unwrap().expose_secret(), "r");
        assert_eq!(token.expires_at, now + TimeDelta::seconds(2_592_000));
    }

    #[test]
    fn test_into_token_keeps_previous_refresh_token() {
        let token = response(r#"{"access_token":"a"}"#)
            .into_token(Utc::now(), Some(SecretString::from("old")));
        assert_eq!(token.refresh_token.unwrap().expose_secret(), "old");
    }

    #[test]
    fn test_into_token_clamps_lifetime() {
        let now = Utc::now();
        let token = response(r#"{"access_token":"a","expires_in":9223372036854775807}"#)
            .into_token(now, None);
        assert_eq!(token.expires_at, now + TimeDelta::seconds(MAX_EXPIRES_IN_SECS));

        let token = response(r#"{"access_token":"a","expires_in":-5}"#).into_token(now, None);
        assert_eq!(token.expires_at, now);
        assert!(token.is_expired(now));
    }

    #[test]
    fn test_needs_refresh_threshold() {
        let now = Utc::now();
        let token = response(r#"{"access_token":"a","expires_in":601}"#).into_token(now, None);
        assert!(!token.needs_refresh(now));
        assert!(token.needs_refresh(now + TimeDelta::seconds(1)));
        assert!(!token.is_expired(now + TimeDelta::seconds(600)));
        assert!(token.is_expired(now + TimeDelta::seconds(601)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let token = response(r#"{"access_token":"very-secret","refresh_token":"also-secret"}"#)
            .into_token(Utc::now(), None);
        let debug = format!("{token:?}");
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
    }
}
