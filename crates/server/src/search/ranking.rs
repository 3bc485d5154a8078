//! Query sanitising and the ranking used when no search backend answers.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::shoper::ShoperProduct;

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 255;

/// Minimum word length taken into account by [`fallback_rank`].
const MIN_RANK_WORD_CHARS: usize = 2;

/// Regex for HTML tags.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// Remove HTML tags.
#[must_use]
pub fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

/// Strip tags, collapse whitespace and cap the length of a user query.
#[must_use]
pub fn sanitize_query(raw: &str) -> String {
    strip_tags(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_QUERY_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Relevance of a product for a query: +2 per query word found in the name,
/// +1 per word found in the description.
#[must_use]
pub fn relevance(query: &str, name: &str, description: &str) -> u32 {
    let name = name.to_lowercase();
    let description = description.to_lowercase();

    query
        .to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_RANK_WORD_CHARS)
        .map(|word| {
            let mut score = 0;
            if name.contains(word) {
                score += 2;
            }
            if description.contains(word) {
                score += 1;
            }
            score
        })
        .sum()
}

/// Reorder raw Shoper products by [`relevance`], keeping the original order
/// among equal scores.
#[must_use]
pub fn fallback_rank(query: &str, products: Vec<Value>) -> Vec<Value> {
    let mut scored: Vec<(u32, Value)> = products
        .into_iter()
        .map(|item| {
            let score = serde_json::from_value::<ShoperProduct>(item.clone())
                .map(|p| relevance(query, p.name(), p.description()))
                .unwrap_or_default();
            (score, item)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query("  <b>buty</b>   sportowe \n"), "buty sportowe");
        assert_eq!(sanitize_query("<script></script>"), "");

        let long = "ż".repeat(300);
        assert_eq!(sanitize_query(&long).chars().count(), MAX_QUERY_CHARS);
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Miękka <em>bawełna</em></p>"), "Miękka bawełna");
    }

    #[test]
    fn test_relevance() {
        assert_eq!(relevance("buty nike", "Buty Nike Air", "Lekkie buty"), 5);
        assert_eq!(relevance("a", "a", "a"), 0);
        assert_eq!(relevance("kurtka", "Buty", "Opis"), 0);
    }

    #[test]
    fn test_fallback_rank_is_stable() {
        let product = |id: u64, name: &str, description: &str| {
            json!({
                "product_id": id,
                "translations": { "pl_PL": { "name": name, "description": description } }
            })
        };
        let ranked = fallback_rank(
            "kurtka",
            vec![
                product(1, "Buty", "bez związku"),
                product(2, "Czapka", "pasuje do kurtka"),
                product(3, "Kurtka zimowa", ""),
                product(4, "Szalik", ""),
            ],
        );
        let ids: Vec<u64> = ranked
            .iter()
            .map(|p| p["product_id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);
    }
}
