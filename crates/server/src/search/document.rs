//! Search documents built from Shoper products.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::shoper::ShoperProduct;
use crate::shoper::types::ProductAttribute;

use super::ranking::strip_tags;

const DEFAULT_CURRENCY: &str = "PLN";
const DEFAULT_UNIT: &str = "szt";

const COLOR_ATTRIBUTES: &[&str] = &["kolor", "color"];
const SIZE_ATTRIBUTES: &[&str] = &["rozmiar", "size"];

/// A product as stored in the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub price_range: String,
    pub brand: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub attributes: Vec<ProductAttribute>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub stock_status: String,
    pub stock: i64,
    pub popularity_score: f64,
    pub created_at: String,
    pub updated_at: String,
    pub sku: String,
    pub tax_id: Option<u64>,
    pub manufacturer_id: Option<u64>,
    pub currency: String,
    pub unit: String,
    pub stock_weight: f64,
    pub search_data: String,
}

impl ProductDocument {
    /// Build the index document for a product.
    #[must_use]
    pub fn from_product(product: &ShoperProduct) -> Self {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let name = product.name().to_string();
        let description = strip_tags(product.description()).trim().to_string();
        let price = product.price();
        let brand = product.producer_name.clone().unwrap_or_default();
        let categories: Vec<String> = product.categories.iter().map(u64::to_string).collect();
        let attributes = product.attribute_list();
        let stock = product.stock_quantity();

        let search_data = [name.as_str(), description.as_str(), brand.as_str()]
            .into_iter()
            .chain(categories.iter().map(String::as_str))
            .chain(product.tags.iter().map(String::as_str))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            product_id: product.product_id.unwrap_or_default().to_string(),
            colors: attribute_values(&attributes, COLOR_ATTRIBUTES),
            sizes: attribute_values(&attributes, SIZE_ATTRIBUTES),
            price_range: price_range(price).to_string(),
            stock_status: if stock > 0 { "in_stock" } else { "out_of_stock" }.to_string(),
            popularity_score: product.popularity_score.unwrap_or_default(),
            created_at: product.add_date.clone().unwrap_or_else(|| now.clone()),
            updated_at: product.edit_date.clone().unwrap_or(now),
            sku: product.code.clone().unwrap_or_default(),
            tax_id: product.tax_id,
            manufacturer_id: product.producer_id,
            currency: DEFAULT_CURRENCY.to_string(),
            unit: DEFAULT_UNIT.to_string(),
            stock_weight: product.stock.weight.unwrap_or_default(),
            tags: product.tags.clone(),
            name,
            description,
            price,
            brand,
            categories,
            attributes,
            stock,
            search_data,
        }
    }
}

/// Price bucket label used for faceting.
#[must_use]
pub fn price_range(price: f64) -> &'static str {
    match price {
        p if p <= 100.0 => "do 100 PLN",
        p if p <= 500.0 => "100-500 PLN",
        p if p <= 1000.0 => "500-1000 PLN",
        p if p <= 5000.0 => "1000-5000 PLN",
        _ => "powyżej 5000 PLN",
    }
}

fn attribute_values(attributes: &[ProductAttribute], names: &[&str]) -> Vec<String> {
    attributes
        .iter()
        .filter(|a| {
            let name = a.name.to_lowercase();
            names.iter().any(|n| name.contains(n))
        })
        .map(|a| a.value.clone())
        .collect()
}

/// Chunk sent to Trieve for a product.
#[derive(Debug, Clone, Serialize)]
pub struct TrieveChunk {
    pub chunk_html: String,
    pub metadata: Value,
    pub tracking_id: String,
    pub upsert_by_tracking_id: bool,
}

/// Build the Trieve chunk for a product.
#[must_use]
pub fn to_trieve_chunk(product: &ShoperProduct) -> TrieveChunk {
    let mut content = format!(
        "Name: {}\nDescription: {}\n",
        product.name(),
        strip_tags(product.description()).trim()
    );

    let attributes = product.attribute_list();
    if !attributes.is_empty() {
        content.push_str("Attributes:\n");
        for attribute in &attributes {
            content.push_str(&format!("- {}: {}\n", attribute.name, attribute.value));
        }
    }

    let id = product.product_id.unwrap_or_default();
    TrieveChunk {
        chunk_html: content,
        metadata: json!({
            "product_id": id,
            "name": product.name(),
            "code": product.code,
            "price": product.price(),
            "category_id": product.category_id,
            "stock": product.stock_quantity(),
        }),
        tracking_id: id.to_string(),
        upsert_by_tracking_id: true,
    }
}
