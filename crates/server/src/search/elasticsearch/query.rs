//! Search request bodies.
//!
//! Pure functions so the generated DSL can be checked without a cluster.

use serde_json::{Map, Value, json};

use crate::search::query_parser::SearchFilters;

/// Default page size when a request does not set one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Shortest prefix that produces suggestions.
pub const MIN_SUGGEST_CHARS: usize = 3;

/// Number of suggestions requested.
pub const SUGGEST_SIZE: u32 = 5;

/// Boosted fields searched by the full-text clause.
const SEARCH_FIELDS: &[&str] = &[
    "name^3",
    "brand^2",
    "categories^1.5",
    "description",
    "tags",
    "search_data",
];

/// Filters supplied by the caller rather than parsed from the query text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalFilters {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub stock_status: Option<String>,
    pub categories: Vec<String>,
    pub in_stock: bool,
}

/// Everything needed to build a product search.
#[derive(Debug, Clone, Default)]
pub struct ProductSearch {
    /// Query text after parameter extraction.
    pub text: String,
    pub parsed: SearchFilters,
    pub external: ExternalFilters,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

/// Body of `POST /{index}/_search`.
#[must_use]
pub fn search_body(search: &ProductSearch) -> Value {
    let limit = search.limit.unwrap_or(DEFAULT_LIMIT).max(1);
    let page = search.page.unwrap_or(1).max(1);

    let must = if search.text.trim().is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({
            "multi_match": {
                "query": search.text,
                "fields": SEARCH_FIELDS,
                "type": "best_fields",
                "operator": "and",
                "fuzziness": "AUTO"
            }
        })
    };

    json!({
        "query": {
            "bool": {
                "must": [must],
                "filter": filter_clauses(&search.parsed, &search.external)
            }
        },
        "sort": [
            { "popularity_score": { "order": "desc" } },
            "_score"
        ],
        "size": limit,
        "from": u64::from(page - 1) * u64::from(limit),
        "_source": true,
        "highlight": {
            "fields": { "name": {}, "description": {} }
        },
        "aggs": aggregations()
    })
}

/// Filter clauses from parsed and external filters, in that order.
#[must_use]
pub fn filter_clauses(parsed: &SearchFilters, external: &ExternalFilters) -> Vec<Value> {
    let mut filters = Vec::new();

    if parsed.price_min.is_some() || parsed.price_max.is_some() {
        let mut range = Map::new();
        if let Some(min) = parsed.price_min {
            range.insert("gte".to_string(), json!(min));
        }
        if let Some(max) = parsed.price_max {
            range.insert("lte".to_string(), json!(max));
        }
        filters.push(json!({ "range": { "price": range } }));
    }
    if let Some(brand) = &parsed.brand {
        filters.push(json!({ "term": { "brand.keyword": brand } }));
    }
    if !parsed.colors.is_empty() {
        filters.push(json!({ "terms": { "colors": parsed.colors } }));
    }
    if !parsed.sizes.is_empty() {
        filters.push(json!({ "terms": { "sizes": parsed.sizes } }));
    }

    if let Some(min) = external.price_min {
        filters.push(json!({ "range": { "price": { "gte": min } } }));
    }
    if let Some(max) = external.price_max {
        filters.push(json!({ "range": { "price": { "lte": max } } }));
    }
    if let Some(status) = external.stock_status.as_deref().filter(|s| !s.is_empty()) {
        filters.push(json!({ "term": { "stock_status": status } }));
    }
    if !external.categories.is_empty() {
        filters.push(json!({ "terms": { "categories.keyword": external.categories } }));
    }
    if external.in_stock {
        filters.push(json!({ "term": { "stock_status": "in_stock" } }));
    }

    filters
}

/// Facets returned with every search.
#[must_use]
pub fn aggregations() -> Value {
    json!({
        "price_ranges": {
            "range": {
                "field": "price",
                "ranges": [
                    { "to": 100 },
                    { "from": 100, "to": 500 },
                    { "from": 500, "to": 1000 },
                    { "from": 1000, "to": 5000 },
                    { "from": 5000 }
                ]
            }
        },
        "brands": { "terms": { "field": "brand.keyword", "size": 10 } },
        "categories": { "terms": { "field": "categories.keyword", "size": 10 } },
        "attributes": {
            "nested": { "path": "attributes" },
            "aggs": {
                "names": {
                    "terms": { "field": "attributes.name", "size": 10 },
                    "aggs": {
                        "values": { "terms": { "field": "attributes.value", "size": 10 } }
                    }
                }
            }
        }
    })
}

/// Body of the name-prefix suggestion query, or `None` when the prefix is
/// too short.
#[must_use]
pub fn suggest_body(prefix: &str) -> Option<Value> {
    let prefix = prefix.trim();
    if prefix.chars().count() < MIN_SUGGEST_CHARS {
        return None;
    }

    Some(json!({
        "query": { "match_phrase_prefix": { "name": { "query": prefix } } },
        "size": SUGGEST_SIZE,
        "_source": ["name"]
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_text_query() {
        let body = search_body(&ProductSearch {
            text: "buty".to_string(),
            limit: Some(10),
            page: Some(3),
            ..ProductSearch::default()
        });

        let must = &body["query"]["bool"]["must"][0]["multi_match"];
        assert_eq!(must["query"], "buty");
        assert_eq!(must["fields"][0], "name^3");
        assert_eq!(must["fields"][2], "categories^1.5");
        assert_eq!(must["operator"], "and");
        assert_eq!(must["fuzziness"], "AUTO");
        assert_eq!(body["size"], 10);
        assert_eq!(body["from"], 20);
        assert_eq!(body["sort"][0]["popularity_score"]["order"], "desc");
        assert_eq!(body["sort"][1], "_score");
        assert!(body["aggs"]["price_ranges"].is_object());
        assert!(body["highlight"]["fields"]["name"].is_object());
    }

    #[test]
    fn test_search_body_empty_text_matches_all() {
        let body = search_body(&ProductSearch::default());
        assert!(body["query"]["bool"]["must"][0]["match_all"].is_object());
        assert_eq!(body["size"], DEFAULT_LIMIT);
        assert_eq!(body["from"], 0);
    }

    #[test]
    fn test_filter_clauses() {
        let parsed = SearchFilters {
            brand: Some("nike".to_string()),
            colors: vec!["czarny".to_string()],
            sizes: vec!["42".to_string()],
            price_min: None,
            price_max: Some(300.0),
        };
        let external = ExternalFilters {
            price_min: Some(50.0),
            categories: vec!["7".to_string()],
            in_stock: true,
            ..ExternalFilters::default()
        };

        let filters = filter_clauses(&parsed, &external);
        assert_eq!(filters.len(), 7);
        assert_eq!(filters[0], json!({ "range": { "price": { "lte": 300.0 } } }));
        assert_eq!(filters[1], json!({ "term": { "brand.keyword": "nike" } }));
        assert_eq!(filters[2], json!({ "terms": { "colors": ["czarny"] } }));
        assert_eq!(filters[3], json!({ "terms": { "sizes": ["42"] } }));
        assert_eq!(filters[4], json!({ "range": { "price": { "gte": 50.0 } } }));
        assert_eq!(filters[5], json!({ "terms": { "categories.keyword": ["7"] } }));
        assert_eq!(filters[6], json!({ "term": { "stock_status": "in_stock" } }));
    }

    #[test]
    fn test_no_filters() {
        assert!(filter_clauses(&SearchFilters::default(), &ExternalFilters::default()).is_empty());
    }

    #[test]
    fn test_suggest_body() {
        assert!(suggest_body("bu").is_none());
        assert!(suggest_body("  ab  ").is_none());

        let body = suggest_body("but").unwrap();
        assert_eq!(body["query"]["match_phrase_prefix"]["name"]["query"], "but");
        assert_eq!(body["size"], SUGGEST_SIZE);
    }
}
