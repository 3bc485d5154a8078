//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `APP_BASE_URL` - Public URL of the app
//! - `ADMIN_API_KEY` - Admin API bearer key (min 32 chars, high entropy)
//! - `SHOPER_SHOP_URL` - Shop URL (e.g., demo.shoparena.pl)
//! - `SHOPER_APP_ID` - OAuth client ID of the app
//! - `SHOPER_APP_SECRET` - OAuth client secret of the app
//!
//! ## Optional
//! - `SERVER_HOST` - Bind address (default: 127.0.0.1)
//! - `SERVER_PORT` - Listen port (default: 8080)
//! - `APP_VERSION` - Reported version (default: crate version)
//! - `SHOPER_API_URL` - REST base (default: `{shop}/webapi/rest`)
//! - `SHOPER_API_VERSION` - Path prefix inserted before each endpoint (default: none)
//! - `SHOPER_CACHE_TTL` - GET cache TTL in seconds (default: 3600)
//! - `SEARCH_DRIVER` - `elasticsearch` or `trieve` (default: elasticsearch)
//! - `ELASTICSEARCH_HOSTS` - Comma-separated hosts, first one is used (default: <http://localhost:9200>)
//! - `ELASTICSEARCH_USERNAME` / `ELASTICSEARCH_PASSWORD` - Basic auth
//! - `ELASTICSEARCH_SSL_VERIFY` - Verify TLS certificates (default: true)
//! - `ELASTICSEARCH_TIMEOUT` - Request timeout in seconds (default: 30)
//! - `ELASTICSEARCH_INDEX` - Index name (default: products)
//! - `TRIEVE_API_KEY` / `TRIEVE_DATASET_ID` - Required when `SEARCH_DRIVER=trieve`
//! - `TRIEVE_API_ENDPOINT` - API base (default: <https://api.trieve.ai/api>)
//! - `TRIEVE_ORGANIZATION_ID` - Sent as `TR-Organization`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use shoper_search_core::ShopUrl;
use thiserror::Error;

const MIN_API_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the app
    pub base_url: String,
    /// Version reported by status endpoints
    pub version: String,
    /// Bearer key for the admin API
    pub admin_api_key: SecretString,
    /// Shoper REST API configuration
    pub shoper: ShoperConfig,
    /// Search backend configuration
    pub search: SearchConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Shoper REST API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShoperConfig {
    /// Normalised shop URL
    pub shop_url: ShopUrl,
    /// OAuth client ID
    pub app_id: String,
    /// OAuth client secret
    pub app_secret: SecretString,
    /// REST API base URL (no trailing slash)
    pub api_url: String,
    /// Optional path prefix placed before each endpoint
    pub api_version: String,
    /// TTL of cached GET responses
    pub cache_ttl: Duration,
}

impl fmt::Debug for ShoperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShoperConfig")
            .field("shop_url", &self.shop_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Which search backend serves product search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDriver {
    #[default]
    Elasticsearch,
    Trieve,
}

impl SearchDriver {
    /// Get the driver name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Elasticsearch => "elasticsearch",
            Self::Trieve => "trieve",
        }
    }
}

impl FromStr for SearchDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "elasticsearch" | "elastic" => Ok(Self::Elasticsearch),
            "trieve" => Ok(Self::Trieve),
            other => Err(format!("unknown search driver '{other}'")),
        }
    }
}

/// Search backend configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Active backend
    pub driver: SearchDriver,
    /// Elasticsearch connection settings
    pub elasticsearch: ElasticsearchConfig,
    /// Trieve settings (present when configured)
    pub trieve: Option<TrieveConfig>,
}

/// Elasticsearch connection settings.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct ElasticsearchConfig {
    /// Base URL of the node (scheme included)
    pub host: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Verify TLS certificates
    pub verify_tls: bool,
    pub timeout: Duration,
    pub index: String,
}

impl fmt::Debug for ElasticsearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticsearchConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("index", &self.index)
            .finish()
    }
}

/// Trieve API settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct TrieveConfig {
    pub api_key: SecretString,
    /// API base URL (no trailing slash)
    pub endpoint: String,
    pub dataset_id: String,
    pub organization_id: Option<String>,
}

impl fmt::Debug for TrieveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrieveConfig")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("dataset_id", &self.dataset_id)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host = parse_env("SERVER_HOST", "127.0.0.1")?;
        let port = parse_env("SERVER_PORT", "8080")?;
        let base_url = get_required_env("APP_BASE_URL")?;
        let version = get_env_or_default("APP_VERSION", env!("CARGO_PKG_VERSION"));
        let admin_api_key = get_validated_secret("ADMIN_API_KEY")?;
        validate_secret_length(&admin_api_key, "ADMIN_API_KEY")?;

        let shoper = ShoperConfig::from_env()?;
        let search = SearchConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            version,
            admin_api_key,
            shoper,
            search,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl ShoperConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_shop = get_required_env("SHOPER_SHOP_URL")?;
        let shop_url = ShopUrl::parse(&raw_shop)
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPER_SHOP_URL".to_string(), e.to_string()))?;

        let api_url = get_optional_env("SHOPER_API_URL")
            .map_or_else(|| default_api_url(&shop_url), |url| url.trim_end_matches('/').to_string());

        let cache_ttl_secs: u64 = parse_env("SHOPER_CACHE_TTL", "3600")?;

        Ok(Self {
            shop_url,
            app_id: get_required_env("SHOPER_APP_ID")?,
            app_secret: get_required_secret("SHOPER_APP_SECRET")?,
            api_url,
            api_version: get_env_or_default("SHOPER_API_VERSION", "")
                .trim_matches('/')
                .to_string(),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }
}

impl SearchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let driver: SearchDriver = parse_env("SEARCH_DRIVER", "elasticsearch")?;

        let trieve = match (
            get_optional_env("TRIEVE_API_KEY"),
            get_optional_env("TRIEVE_DATASET_ID"),
        ) {
            (Some(api_key), Some(dataset_id)) => Some(TrieveConfig {
                api_key: SecretString::from(api_key),
                endpoint: get_env_or_default("TRIEVE_API_ENDPOINT", "https://api.trieve.ai/api")
                    .trim_end_matches('/')
                    .to_string(),
                dataset_id,
                organization_id: get_optional_env("TRIEVE_ORGANIZATION_ID"),
            }),
            _ => None,
        };

        if driver == SearchDriver::Trieve && trieve.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "TRIEVE_API_KEY and TRIEVE_DATASET_ID (required for SEARCH_DRIVER=trieve)"
                    .to_string(),
            ));
        }

        let hosts = get_env_or_default("ELASTICSEARCH_HOSTS", "http://localhost:9200");
        let timeout_secs: u64 = parse_env("ELASTICSEARCH_TIMEOUT", "30")?;
        let verify_tls = parse_bool(
            "ELASTICSEARCH_SSL_VERIFY",
            &get_env_or_default("ELASTICSEARCH_SSL_VERIFY", "true"),
        )?;

        let elasticsearch = ElasticsearchConfig {
            host: first_host(&hosts),
            username: get_optional_env("ELASTICSEARCH_USERNAME"),
            password: get_optional_env("ELASTICSEARCH_PASSWORD").map(SecretString::from),
            verify_tls,
            timeout: Duration::from_secs(timeout_secs),
            index: get_env_or_default("ELASTICSEARCH_INDEX", "products"),
        };

        Ok(Self {
            driver,
            elasticsearch,
            trieve,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`).
fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Default REST base for a shop.
fn default_api_url(shop_url: &ShopUrl) -> String {
    format!("{}/webapi/rest", shop_url.as_str())
}

/// First host of a comma-separated list, with `http://` added when no scheme is given.
fn first_host(hosts: &str) -> String {
    let host = hosts
        .split(',')
        .map(str::trim)
        .find(|h| !h.is_empty())
        .unwrap_or("localhost:9200")
        .trim_end_matches('/');

    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_API_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_API_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A complete configuration for tests that never touch the network.
    pub(crate) fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/shoper_search_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            version: "0.1.0-test".to_string(),
            admin_api_key: SecretString::from("Zq8!vR2#kL9$wT4^mN7&pX1*cB6@hJ3%"),
            shoper: ShoperConfig {
                shop_url: ShopUrl::parse("demo.shoparena.pl").unwrap(),
                app_id: "app-id".to_string(),
                app_secret: SecretString::from("app-secret-value"),
                api_url: "https://demo.shoparena.pl/webapi/rest".to_string(),
                api_version: String::new(),
                cache_ttl: Duration::from_secs(3600),
            },
            search: SearchConfig {
                driver: SearchDriver::Elasticsearch,
                elasticsearch: ElasticsearchConfig {
                    host: "http://127.0.0.1:9".to_string(),
                    username: None,
                    password: None,
                    verify_tls: true,
                    timeout: Duration::from_secs(1),
                    index: "products".to_string(),
                },
                trieve: None,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-admin-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "K").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "K").is_ok());
    }

    #[test]
    fn test_search_driver_from_str() {
        assert_eq!(
            "Elasticsearch".parse::<SearchDriver>().unwrap(),
            SearchDriver::Elasticsearch
        );
        assert_eq!("trieve".parse::<SearchDriver>().unwrap(), SearchDriver::Trieve);
        assert!("solr".parse::<SearchDriver>().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", "TRUE").unwrap());
        assert!(parse_bool("K", "1").unwrap());
        assert!(!parse_bool("K", "off").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }

    #[test]
    fn test_first_host() {
        assert_eq!(first_host("es1:9200,es2:9200"), "http://es1:9200");
        assert_eq!(first_host(" https://es.local/ "), "https://es.local");
        assert_eq!(first_host(""), "http://localhost:9200");
    }

    #[test]
    fn test_default_api_url() {
        let shop = ShopUrl::parse("demo.shoparena.pl").unwrap();
        assert_eq!(default_api_url(&shop), "https://demo.shoparena.pl/webapi/rest");
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let shoper = format!("{:?}", config.shoper);
        assert!(shoper.contains("demo.shoparena.pl"));
        assert!(shoper.contains("[REDACTED]"));
        assert!(!shoper.contains("app-secret-value"));

        let trieve = TrieveConfig {
            api_key: SecretString::from("tr-super-secret"),
            endpoint: "https://api.trieve.ai/api".to_string(),
            dataset_id: "ds".to_string(),
            organization_id: None,
        };
        assert!(!format!("{trieve:?}").contains("tr-super-secret"));
    }
}
