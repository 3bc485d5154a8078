//! Index settings and product mapping.

use serde_json::{Value, json};

/// Synonym groups applied by the `polish_analyzer`.
pub const SYNONYMS: &[&str] = &[
    "buty sportowe, sneakers, obuwie sportowe",
    "kurtka, płaszcz, jacket",
    "spodnie, pants, jeansy",
];

/// Shoper dates (`2024-01-10 10:00:00`) as well as RFC 3339.
const DATE_FORMAT: &str = "yyyy-MM-dd HH:mm:ss||strict_date_optional_time||epoch_millis";

/// Body of the `PUT /{index}` request creating the product index.
#[must_use]
pub fn index_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "refresh_interval": "1s",
            "analysis": {
                "filter": {
                    "polish_stop": { "type": "stop", "stopwords": "_polish_" },
                    "polish_synonyms": { "type": "synonym", "synonyms": SYNONYMS }
                },
                "analyzer": {
                    "polish_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "polish_stop", "trim", "polish_synonyms", "asciifolding"]
                    }
                }
            }
        },
        "mappings": product_mapping()
    })
}

fn product_mapping() -> Value {
    let keyword = json!({ "type": "keyword" });
    let polish_text = json!({ "type": "text", "analyzer": "polish_analyzer" });
    let text_with_keyword = json!({
        "type": "text",
        "fields": { "keyword": { "type": "keyword" } }
    });
    let date = json!({ "type": "date", "format": DATE_FORMAT });

    json!({
        "properties": {
            "product_id": keyword,
            "name": {
                "type": "text",
                "analyzer": "polish_analyzer",
                "fields": { "keyword": { "type": "keyword" } }
            },
            "description": polish_text,
            "price": { "type": "double" },
            "price_range": keyword,
            "brand": text_with_keyword,
            "categories": text_with_keyword,
            "tags": text_with_keyword,
            "attributes": {
                "type": "nested",
                "properties": {
                    "name": keyword,
                    "value": keyword
                }
            },
            "colors": keyword,
            "sizes": keyword,
            "stock_status": keyword,
            "stock": { "type": "integer" },
            "popularity_score": { "type": "float" },
            "created_at": date,
            "updated_at": date,
            "sku": keyword,
            "tax_id": { "type": "integer" },
            "currency": keyword,
            "manufacturer_id": { "type": "integer" },
            "unit": keyword,
            "stock_weight": { "type": "float" },
            "search_data": polish_text
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_definition() {
        let definition = index_definition();
        let settings = &definition["settings"];
        assert_eq!(settings["number_of_shards"], 1);
        assert_eq!(settings["number_of_replicas"], 0);
        assert_eq!(
            settings["analysis"]["filter"]["polish_synonyms"]["synonyms"][1],
            "kurtka, płaszcz, jacket"
        );

        let properties = &definition["mappings"]["properties"];
        assert_eq!(properties["name"]["analyzer"], "polish_analyzer");
        assert_eq!(properties["name"]["fields"]["keyword"]["type"], "keyword");
        assert_eq!(properties["attributes"]["type"], "nested");
        assert_eq!(properties["brand"]["fields"]["keyword"]["type"], "keyword");
        assert_eq!(properties["created_at"]["type"], "date");
    }
}
