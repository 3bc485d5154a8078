//! Shop URL type.

use core::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Errors that can occur when parsing a [`ShopUrl`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopUrlError {
    /// The input string is empty.
    #[error("shop URL cannot be empty")]
    Empty,
    /// The input could not be parsed as a URL.
    #[error("invalid shop URL: {0}")]
    Invalid(String),
    /// The URL has no host component.
    #[error("shop URL must have a host")]
    MissingHost,
}

/// A normalised Shoper shop URL.
///
/// ## Normalisation
///
/// - Surrounding whitespace and trailing slashes are removed
/// - `https://` is prepended when the input has no scheme
///
/// ## Examples
///
/// ```
/// use shoper_search_core::ShopUrl;
///
/// let shop = ShopUrl::parse("demo.shoparena.pl/").unwrap();
/// assert_eq!(shop.as_str(), "https://demo.shoparena.pl");
/// assert_eq!(shop.host(), "demo.shoparena.pl");
///
/// assert!(ShopUrl::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopUrl {
    url: String,
    host: String,
}

impl ShopUrl {
    /// Parse and normalise a shop URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, is not a URL, or has no host.
    pub fn parse(s: &str) -> Result<Self, ShopUrlError> {
        let trimmed = s.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ShopUrlError::Empty);
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("https://{trimmed}")
        };

        let parsed = Url::parse(&candidate).map_err(|e| ShopUrlError::Invalid(e.to_string()))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(ShopUrlError::MissingHost)?
            .to_owned();

        Ok(Self {
            url: candidate,
            host,
        })
    }

    /// Returns the normalised URL (scheme included, no trailing slash).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Returns the host part of the URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for ShopUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl std::str::FromStr for ShopUrl {
    type Err = ShopUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopUrl {
    type Error = ShopUrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopUrl> for String {
    fn from(shop: ShopUrl) -> Self {
        shop.url
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adds_scheme() {
        let shop = ShopUrl::parse("demo.shoparena.pl").unwrap();
        assert_eq!(shop.as_str(), "https://demo.shoparena.pl");
    }

    #[test]
    fn test_parse_keeps_existing_scheme() {
        let shop = ShopUrl::parse("http://localhost:8000/").unwrap();
        assert_eq!(shop.as_str(), "http://localhost:8000");
        assert_eq!(shop.host(), "localhost");
    }

    #[test]
    fn test_parse_strips_trailing_slashes() {
        let shop = ShopUrl::parse("  https://shop.example.com///  ").unwrap();
        assert_eq!(shop.as_str(), "https://shop.example.com");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ShopUrl::parse(""), Err(ShopUrlError::Empty));
        assert_eq!(ShopUrl::parse(" / "), Err(ShopUrlError::Empty));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            ShopUrl::parse("https://"),
            Err(ShopUrlError::Invalid(_) | ShopUrlError::MissingHost)
        ));
    }

    #[test]
    fn test_serde_roundtrip_normalises() {
        let shop: ShopUrl = serde_json::from_str("\"demo.shoparena.pl/\"").unwrap();
        assert_eq!(
            serde_json::to_string(&shop).unwrap(),
            "\"https://demo.shoparena.pl\""
        );
    }
}
