//! Query parser preview command.

use serde_json::{Value, json};
use shoper_search_server::search::query_parser::{QueryParser, QueryParserConfig};

/// Parse a query and return the parsed form and derived filters.
#[must_use]
pub fn preview(text: &str, russian: bool) -> Value {
    let config = if russian {
        QueryParserConfig::russian()
    } else {
        QueryParserConfig::polish()
    };
    let parsed = QueryParser::new(config).parse(text);
    let filters = QueryParser::build_search_filters(&parsed.parameters);

    json!({ "parsed": parsed, "filters": filters })
}

/// Log the parsed query as JSON.
///
/// # Errors
///
/// Returns an error if the result cannot be serialized.
pub fn run(text: &str, russian: bool) -> Result<(), serde_json::Error> {
    let output = serde_json::to_string_pretty(&preview(text, russian))?;
    tracing::info!("\n{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_polish() {
        let out = preview("buty nike do 300 zł", false);
        assert_eq!(out["filters"]["brand"], "nike");
        assert_eq!(out["filters"]["price_max"], 300.0);
    }

    #[test]
    fn test_preview_russian() {
        let out = preview("кроссовки adidas", true);
        assert_eq!(out["parsed"]["parameters"]["brand"], "adidas");
    }
}
