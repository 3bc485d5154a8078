//! Cache keys for Shoper API responses.

/// Resources whose responses are never cached (prefix match).
const UNCACHEABLE_PREFIXES: &[&str] = &["cart", "order", "payment", "webhook"];

/// Cache key for a GET request.
///
/// Query pairs are sorted so that parameter order does not produce distinct
/// entries.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    resource: String,
    query: Vec<(String, String)>,
}

impl CacheKey {
    /// Build a key from an endpoint and its query pairs.
    #[must_use]
    pub fn new(endpoint: &str, query: &[(String, String)]) -> Self {
        let mut query = query.to_vec();
        query.sort();

        Self {
            resource: normalize_endpoint(endpoint).to_string(),
            query,
        }
    }

    /// First path segment of the endpoint (e.g. `products` for `products/5`).
    #[must_use]
    pub fn root(&self) -> &str {
        resource_root(&self.resource)
    }
}

/// Strip leading and trailing slashes from an endpoint.
pub(crate) fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.trim_matches('/')
}

/// First path segment of an endpoint.
pub(crate) fn resource_root(endpoint: &str) -> &str {
    normalize_endpoint(endpoint)
        .split('/')
        .next()
        .unwrap_or_default()
}

/// Whether GET responses for an endpoint may be cached.
pub(crate) fn is_cacheable(endpoint: &str) -> bool {
    let endpoint = normalize_endpoint(endpoint);
    !UNCACHEABLE_PREFIXES
        .iter()
        .any(|prefix| endpoint.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_key_ignores_parameter_order() {
        let a = CacheKey::new("products", &pairs(&[("page", "1"), ("limit", "25")]));
        let b = CacheKey::new("/products/", &pairs(&[("limit", "25"), ("page", "1")]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinguishes_parameters() {
        let a = CacheKey::new("products", &pairs(&[("page", "1")]));
        let b = CacheKey::new("products", &pairs(&[("page", "2")]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_root() {
        assert_eq!(CacheKey::new("products/5/categories", &[]).root(), "products");
        assert_eq!(CacheKey::new("/shop/info", &[]).root(), "shop");
        assert_eq!(resource_root(""), "");
    }

    #[test]
    fn test_is_cacheable() {
        assert!(is_cacheable("products"));
        assert!(is_cacheable("/categories/3"));
        assert!(!is_cacheable("orders"));
        assert!(!is_cacheable("order-statuses"));
        assert!(!is_cacheable("/cart"));
        assert!(!is_cacheable("payments"));
        assert!(!is_cacheable("webhooks/1"));
    }
}
