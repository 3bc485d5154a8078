//! Shoper API data types.
//!
//! Shoper returns many numeric fields as strings (`"199.00"`, `"5"`), so the
//! product types deserialize numbers leniently and treat unparseable values
//! as absent.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Default page size for list requests.
pub const DEFAULT_LIST_LIMIT: u32 = 25;

/// Largest page size Shoper accepts.
pub const MAX_LIST_LIMIT: u32 = 50;

/// Query-string prefix marking a pass-through filter (`filter_name=value`).
const FILTER_PREFIX: &str = "filter_";

/// Locale preferred when reading product translations.
const PREFERRED_LOCALE: &str = "pl_PL";

// =============================================================================
// Shop info
// =============================================================================

/// Basic information about the connected shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopInfo {
    pub name: String,
    pub url: String,
    pub api_version: String,
    pub features: Vec<String>,
}

impl ShopInfo {
    /// Placeholder used when the shop cannot be reached.
    #[must_use]
    pub fn fallback(url: &str, api_version: &str) -> Self {
        Self {
            name: "Unknown".to_string(),
            url: url.to_string(),
            api_version: api_version.to_string(),
            features: Vec::new(),
        }
    }

    /// Build from a `shop/info` response, filling gaps from the fallback.
    #[must_use]
    pub fn from_response(value: &Value, url: &str, api_version: &str) -> Self {
        let fallback = Self::fallback(url, api_version);
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            name: text("name").unwrap_or(fallback.name),
            url: text("url").unwrap_or(fallback.url),
            api_version: text("api_version").unwrap_or(fallback.api_version),
            features: value
                .get("features")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

// =============================================================================
// List requests
// =============================================================================

/// Paging and filtering of a Shoper list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub limit: u32,
    pub page: u32,
    /// Encoded as the `filters` JSON query parameter.
    pub filters: BTreeMap<String, Value>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            page: 1,
            filters: BTreeMap::new(),
        }
    }
}

impl ListParams {
    /// Create params for a given page.
    #[must_use]
    pub fn page(limit: u32, page: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIST_LIMIT),
            page: page.max(1),
            filters: BTreeMap::new(),
        }
    }

    /// Add a filter.
    #[must_use]
    pub fn with_filter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.filters.insert(name.into(), value);
        self
    }

    /// Build from raw request query parameters.
    ///
    /// `limit` and `page` fall back to their defaults when missing or invalid;
    /// every `filter_<name>=<value>` becomes filter `<name>`.
    #[must_use]
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let limit = query
            .get("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LIST_LIMIT);
        let page = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);

        let filters = query
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(FILTER_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), Value::String(value.clone())))
            })
            .collect();

        Self {
            filters,
            ..Self::page(limit, page)
        }
    }

    /// Query pairs sent to Shoper.
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("page".to_string(), self.page.to_string()),
        ];
        if !self.filters.is_empty() {
            let encoded = serde_json::to_string(&self.filters).unwrap_or_default();
            query.push(("filters".to_string(), encoded));
        }
        query
    }
}

/// One page of a Shoper list response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage<T> {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pages: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub page: u64,
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

// =============================================================================
// Products
// =============================================================================

/// Product as returned by `GET products/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShoperProduct {
    #[serde(default, deserialize_with = "lenient")]
    pub product_id: Option<u64>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub category_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub categories: Vec<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub producer_id: Option<u64>,
    /// Producer name when the response embeds it.
    #[serde(default)]
    pub producer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tax_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub unit_id: Option<u64>,
    #[serde(default)]
    pub add_date: Option<String>,
    #[serde(default)]
    pub edit_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub stock: ProductStock,
    /// PHP serialises an empty map as `[]`, which decodes as no translations.
    #[serde(default, deserialize_with = "lenient_translations")]
    pub translations: BTreeMap<String, ProductTranslation>,
    /// Either a list of `{name, value}` objects or Shoper's nested
    /// `{group: {attribute: value}}` map.
    #[serde(default)]
    pub attributes: Value,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub popularity_score: Option<f64>,
}

/// Stock block of a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductStock {
    #[serde(default, deserialize_with = "lenient")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient")]
    pub stock: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub weight: Option<f64>,
}

/// Localised product texts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductTranslation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A flattened product attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub name: String,
    pub value: String,
}

impl ShoperProduct {
    /// Translation to read texts from: `pl_PL` first, then any with a name.
    fn translation(&self) -> Option<&ProductTranslation> {
        self.translations
            .get(PREFERRED_LOCALE)
            .filter(|t| t.name.is_some())
            .or_else(|| self.translations.values().find(|t| t.name.is_some()))
    }

    /// Product name (empty when no translation has one).
    #[must_use]
    pub fn name(&self) -> &str {
        self.translation()
            .and_then(|t| t.name.as_deref())
            .unwrap_or_default()
    }

    /// Product description (raw HTML, empty when missing).
    #[must_use]
    pub fn description(&self) -> &str {
        self.translation()
            .and_then(|t| t.description.as_deref())
            .unwrap_or_default()
    }

    /// Price as a float (0.0 when missing).
    #[must_use]
    pub fn price(&self) -> f64 {
        self.stock
            .price
            .and_then(|p| p.to_f64())
            .unwrap_or_default()
    }

    /// Units in stock, truncated to a whole number.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // stock counts are far below i64::MAX
    pub fn stock_quantity(&self) -> i64 {
        self.stock.stock.map_or(0, |s| s.trunc() as i64)
    }

    /// Attributes flattened into `{name, value}` pairs.
    #[must_use]
    pub fn attribute_list(&self) -> Vec<ProductAttribute> {
        let mut out = Vec::new();
        collect_attributes(&self.attributes, None, &mut out);
        out
    }
}

fn collect_attributes(value: &Value, key: Option<&str>, out: &mut Vec<ProductAttribute>) {
    match value {
        Value::Array(items) => {
            for item in items {
                let name = item.get("name").and_then(Value::as_str);
                let val = item.get("value").map(value_to_text);
                if let (Some(name), Some(val)) = (name, val) {
                    out.push(ProductAttribute {
                        name: name.to_string(),
                        value: val,
                    });
                }
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                collect_attributes(v, Some(k), out);
            }
        }
        Value::Null => {}
        scalar => {
            if let Some(name) = key {
                out.push(ProductAttribute {
                    name: name.to_string(),
                    value: value_to_text(scalar),
                });
            }
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Lenient deserializers
// =============================================================================

fn parse_scalar<T: FromStr>(value: &Value) -> Option<T> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accept a number, a numeric string, or null.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_scalar))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer).map(Option::unwrap_or_default)
}

/// Accept a list of ids given as numbers or strings.
fn lenient_ids<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(parse_scalar).collect(),
        _ => Vec::new(),
    })
}

/// Decode a nested object, falling back to its default for `null` or any
/// other shape.
fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

/// Accept translations keyed by locale, dropping entries that do not decode.
fn lenient_translations<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, ProductTranslation>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(locale, v)| serde_json::from_value(v).ok().map(|t| (locale, t)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Accept tags as a list of strings or numbers; `null` means none.
fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
