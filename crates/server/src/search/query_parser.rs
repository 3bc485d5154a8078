//! Extraction of structured parameters from free-text queries.
//!
//! A query like `buty nike czerwony rozmiar 42 do 300 zł` is split into the
//! remaining text (`buty`) and the recognised parameters (brand, colour,
//! size, price). Rules run in order and each one sees the query as already
//! cleaned by the rules before it.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::debug;

/// Kind of parameter a rule recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Brand,
    Color,
    Size,
    Price,
}

/// Which side of a price range a pattern fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBound {
    /// `do 300 zł`
    Max,
    /// `od 100 zł`
    Min,
    /// `100-200 zł`, two capture groups.
    Range,
    /// `300 zł`, treated as an upper bound.
    Exact,
}

/// A price regex and the bound it fixes.
#[derive(Debug, Clone)]
pub struct PricePattern {
    pub regex: Regex,
    pub bound: PriceBound,
}

/// How a rule finds its value.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Known values matched as whole words, case-insensitively.
    Keywords(Vec<String>),
    /// Regexes; the value is capture group 1 or the whole match.
    Patterns(Vec<Regex>),
    /// Price regexes.
    Prices(Vec<PricePattern>),
}

/// One recognition rule.
#[derive(Debug, Clone)]
pub struct ParameterRule {
    pub kind: ParameterKind,
    /// Words introducing a value (`kolor: czarny`).
    pub prefixes: Vec<String>,
    pub matcher: Matcher,
}

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct QueryParserConfig {
    pub enabled: bool,
    pub rules: Vec<ParameterRule>,
}

impl Default for QueryParserConfig {
    fn default() -> Self {
        Self::polish()
    }
}

impl QueryParserConfig {
    /// Polish rule set used by default.
    #[must_use]
    pub fn polish() -> Self {
        Self {
            enabled: true,
            rules: vec![
                ParameterRule {
                    kind: ParameterKind::Brand,
                    prefixes: words(&["marka", "brand", "firma"]),
                    matcher: Matcher::Keywords(words(&[
                        "nike",
                        "adidas",
                        "puma",
                        "reebok",
                        "new balance",
                        "asics",
                    ])),
                },
                ParameterRule {
                    kind: ParameterKind::Color,
                    prefixes: words(&["kolor", "color"]),
                    matcher: Matcher::Keywords(words(&[
                        "biały",
                        "czarny",
                        "czerwony",
                        "niebieski",
                        "zielony",
                        "żółty",
                        "różowy",
                        "fioletowy",
                        "brązowy",
                        "szary",
                    ])),
                },
                ParameterRule {
                    kind: ParameterKind::Size,
                    prefixes: words(&["rozmiar", "size"]),
                    matcher: Matcher::Patterns(vec![
                        literal(r"\brozmiar[:\s]+(\d+)"),
                        literal(r"\bsize[:\s]+(\d+)"),
                        literal(r"\b(\d+)\s*(?:eu|cm|mm)\b"),
                    ]),
                },
                ParameterRule {
                    kind: ParameterKind::Price,
                    prefixes: words(&["cena", "price"]),
                    matcher: Matcher::Prices(vec![
                        price(r"\bdo\s*(\d+)\s*zł\b", PriceBound::Max),
                        price(r"\bod\s*(\d+)\s*zł\b", PriceBound::Min),
                        price(r"\b(\d+)\s*-\s*(\d+)\s*zł\b", PriceBound::Range),
                        price(r"\b(\d+)\s*zł\b", PriceBound::Exact),
                        price(r"\b(\d+)\s*pln\b", PriceBound::Exact),
                    ]),
                },
            ],
        }
    }

    /// Russian rule set.
    #[must_use]
    pub fn russian() -> Self {
        Self {
            enabled: true,
            rules: vec![
                ParameterRule {
                    kind: ParameterKind::Brand,
                    prefixes: words(&["бренд", "фирма", "марка"]),
                    matcher: Matcher::Keywords(words(&[
                        "nike",
                        "adidas",
                        "puma",
                        "reebok",
                        "new balance",
                        "asics",
                    ])),
                },
                ParameterRule {
                    kind: ParameterKind::Color,
                    prefixes: words(&["цвет", "цвета"]),
                    matcher: Matcher::Keywords(words(&[
                        "белый",
                        "черный",
                        "красный",
                        "синий",
                        "зеленый",
                        "желтый",
                        "серый",
                        "розовый",
                        "оранжевый",
                        "фиолетовый",
                        "коричневый",
                    ])),
                },
                ParameterRule {
                    kind: ParameterKind::Size,
                    prefixes: Vec::new(),
                    matcher: Matcher::Patterns(vec![
                        literal(r"\b(\d+)\s*размер\b"),
                        literal(r"\bразмер\s*(\d+)\b"),
                    ]),
                },
                ParameterRule {
                    kind: ParameterKind::Price,
                    prefixes: Vec::new(),
                    matcher: Matcher::Prices(vec![
                        price(r"\bдо\s*(\d+)\s*р\b", PriceBound::Max),
                        price(r"\bот\s*(\d+)\s*р\b", PriceBound::Min),
                        price(r"\b(\d+)-(\d+)\s*р\b", PriceBound::Range),
                    ]),
                },
            ],
        }
    }

    /// Same rules, recognition switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::polish()
        }
    }
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Case-insensitive regex from a literal pattern.
fn literal(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("Invalid regex")
}

fn price(pattern: &str, bound: PriceBound) -> PricePattern {
    PricePattern {
        regex: literal(pattern),
        bound,
    }
}

/// Case-insensitive regex from text assembled at runtime.
fn dynamic(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

/// Regex for runs of commas separated only by whitespace.
static DOUBLE_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*,").expect("Invalid regex"));

// =============================================================================
// Parsed output
// =============================================================================

/// Price bounds taken from a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Parameters recognised in a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceRange>,
}

impl QueryParameters {
    /// Whether nothing was recognised.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.brand.is_none() && self.color.is_none() && self.size.is_none() && self.price.is_none()
    }
}

/// Result of [`QueryParser::parse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuery {
    pub original_query: String,
    pub cleaned_query: String,
    pub parameters: QueryParameters,
}

/// Filters derived from recognised parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sizes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
}

// =============================================================================
// Parser
// =============================================================================

/// What a rule found: the value, the text it matched, and for prices the
/// bounds.
struct Extraction {
    value: String,
    span: String,
    price: Option<PriceRange>,
}

struct CompiledRule {
    kind: ParameterKind,
    prefixes: Vec<String>,
    prefix_patterns: Vec<Regex>,
    keywords: Vec<(String, Regex)>,
    matcher: Matcher,
}

/// Free-text query parser.
pub struct QueryParser {
    enabled: bool,
    rules: Vec<CompiledRule>,
}

impl std::fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParser")
            .field("enabled", &self.enabled)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new(QueryParserConfig::default())
    }
}

impl QueryParser {
    /// Compile a parser from its configuration.
    #[must_use]
    pub fn new(config: QueryParserConfig) -> Self {
        let rules = config
            .rules
            .into_iter()
            .map(|rule| {
                let prefix_patterns = rule
                    .prefixes
                    .iter()
                    .filter_map(|p| dynamic(&format!(r"\b{}[\s:]+([^\s,]+)", regex::escape(p))))
                    .collect();
                let keywords = match &rule.matcher {
                    Matcher::Keywords(list) => list
                        .iter()
                        .filter_map(|k| {
                            dynamic(&format!(r"\b{}\b", regex::escape(k))).map(|re| (k.clone(), re))
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                CompiledRule {
                    kind: rule.kind,
                    prefixes: rule.prefixes,
                    prefix_patterns,
                    keywords,
                    matcher: rule.matcher,
                }
            })
            .collect();

        Self {
            enabled: config.enabled,
            rules,
        }
    }

    /// Split a query into remaining text and recognised parameters.
    #[must_use]
    pub fn parse(&self, query: &str) -> ParsedQuery {
        let mut parameters = QueryParameters::default();
        let mut remaining = query.trim().to_string();

        if self.enabled {
            for rule in &self.rules {
                let Some(found) = extract(rule, &remaining) else {
                    continue;
                };

                match rule.kind {
                    ParameterKind::Brand => parameters.brand = Some(found.value.clone()),
                    ParameterKind::Color => parameters.color = Some(found.value.clone()),
                    ParameterKind::Size => parameters.size = Some(found.value.clone()),
                    ParameterKind::Price => parameters.price = found.price,
                }
                remaining = remove_parameter(&remaining, &found, &rule.prefixes);
            }
        }

        let parsed = ParsedQuery {
            original_query: query.to_string(),
            cleaned_query: remaining.trim().to_string(),
            parameters,
        };
        debug!(query, cleaned = %parsed.cleaned_query, "Parsed search query");
        parsed
    }

    /// Turn recognised parameters into search filters.
    #[must_use]
    pub fn build_search_filters(parameters: &QueryParameters) -> SearchFilters {
        let sizes = parameters
            .size
            .as_deref()
            .and_then(first_number)
            .into_iter()
            .collect();

        SearchFilters {
            brand: parameters.brand.clone(),
            colors: parameters.color.iter().cloned().collect(),
            sizes,
            price_min: parameters.price.and_then(|p| p.min),
            price_max: parameters.price.and_then(|p| p.max),
        }
    }
}

fn extract(rule: &CompiledRule, query: &str) -> Option<Extraction> {
    let matched = match &rule.matcher {
        Matcher::Keywords(_) => rule.keywords.iter().find_map(|(keyword, re)| {
            re.find(query).map(|m| Extraction {
                value: keyword.clone(),
                span: m.as_str().to_string(),
                price: None,
            })
        }),
        Matcher::Patterns(patterns) => patterns.iter().find_map(|re| {
            re.captures(query).map(|caps| {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                Extraction {
                    value: caps.get(1).map_or(whole, |m| m.as_str()).to_string(),
                    span: whole.to_string(),
                    price: None,
                }
            })
        }),
        Matcher::Prices(patterns) => patterns.iter().find_map(|pattern| {
            let caps = pattern.regex.captures(query)?;
            let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
            let range = match pattern.bound {
                PriceBound::Max | PriceBound::Exact => PriceRange {
                    min: None,
                    max: number(1),
                },
                PriceBound::Min => PriceRange {
                    min: number(1),
                    max: None,
                },
                PriceBound::Range => PriceRange {
                    min: number(1),
                    max: number(2),
                },
            };
            let whole = caps.get(0)?.as_str().to_string();
            Some(Extraction {
                value: caps.get(1).map_or_else(|| whole.clone(), |m| m.as_str().to_string()),
                span: whole,
                price: Some(range),
            })
        }),
    };

    matched.or_else(|| extract_prefixed(rule, query))
}

/// `{prefix}[\s:]+value` fallback.
fn extract_prefixed(rule: &CompiledRule, query: &str) -> Option<Extraction> {
    rule.prefix_patterns.iter().find_map(|re| {
        let caps = re.captures(query)?;
        let value = caps.get(1)?.as_str().to_string();
        let span = caps.get(0)?.as_str().to_string();

        if rule.kind == ParameterKind::Price {
            let price = price_from_text(&value)?;
            Some(Extraction {
                value,
                span,
                price: Some(price),
            })
        } else {
            Some(Extraction {
                value,
                span,
                price: None,
            })
        }
    })
}

/// `100-200` gives both bounds; a single amount is an upper bound.
fn price_from_text(text: &str) -> Option<PriceRange> {
    let numbers: Vec<f64> = text
        .split('-')
        .filter_map(|part| part.trim().parse().ok())
        .collect();

    match numbers.as_slice() {
        [max] => Some(PriceRange {
            min: None,
            max: Some(*max),
        }),
        [min, max] => Some(PriceRange {
            min: Some(*min),
            max: Some(*max),
        }),
        _ => None,
    }
}

fn first_number(text: &str) -> Option<String> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    (!digits.is_empty()).then_some(digits)
}

fn remove_parameter(query: &str, found: &Extraction, prefixes: &[String]) -> String {
    let value = regex::escape(&found.value);
    let mut query = query.to_string();

    let mut patterns: Vec<String> = prefixes
        .iter()
        .flat_map(|prefix| {
            let prefix = regex::escape(prefix);
            [
                format!(r"{prefix}[\s:]+{value}"),
                format!(r"{value}[\s,]+{prefix}"),
            ]
        })
        .collect();
    patterns.push(regex::escape(&found.span));
    patterns.push(format!(r"\b{value}\b"));

    for pattern in patterns.iter().filter(|p| !p.is_empty()) {
        if let Some(re) = dynamic(pattern) {
            query = re.replace_all(&query, "").into_owned();
        }
    }

    tidy(&query)
}

fn tidy(query: &str) -> String {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    DOUBLE_COMMA_RE
        .replace_all(&collapsed, ",")
        .trim_matches(|c: char| c == ' ' || c == ',')
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(query: &str) -> ParsedQuery {
        QueryParser::default().parse(query)
    }

    #[test]
    fn test_full_query() {
        let parsed = parse("buty nike czerwony rozmiar 42 do 300 zł");
        assert_eq!(parsed.cleaned_query, "buty");
        assert_eq!(parsed.parameters.brand.as_deref(), Some("nike"));
        assert_eq!(parsed.parameters.color.as_deref(), Some("czerwony"));
        assert_eq!(parsed.parameters.size.as_deref(), Some("42"));
        assert_eq!(
            parsed.parameters.price,
            Some(PriceRange {
                min: None,
                max: Some(300.0)
            })
        );
        assert_eq!(parsed.original_query, "buty nike czerwony rozmiar 42 do 300 zł");
    }

    #[test]
    fn test_keywords_are_whole_words_case_insensitive() {
        let parsed = parse("Kurtka NIKE");
        assert_eq!(parsed.parameters.brand.as_deref(), Some("nike"));
        assert_eq!(parsed.cleaned_query, "Kurtka");

        // "pumas" must not match the "puma" keyword
        let parsed = parse("pumas plush toy");
        assert!(parsed.parameters.brand.is_none());
        assert_eq!(parsed.cleaned_query, "pumas plush toy");
    }

    #[test]
    fn test_multi_word_keyword() {
        let parsed = parse("new balance 574");
        assert_eq!(parsed.parameters.brand.as_deref(), Some("new balance"));
        assert_eq!(parsed.cleaned_query, "574");
    }

    #[test]
    fn test_prefix_value() {
        let parsed = parse("koszulka kolor: zielony");
        assert_eq!(parsed.parameters.color.as_deref(), Some("zielony"));
        assert_eq!(parsed.cleaned_query, "koszulka");

        let parsed = parse("marka: Zara sukienka");
        assert_eq!(parsed.parameters.brand.as_deref(), Some("Zara"));
        assert_eq!(parsed.cleaned_query, "sukienka");
    }

    #[test]
    fn test_price_bounds() {
        let min = parse("kurtka od 100 zł").parameters.price.unwrap();
        assert_eq!(min, PriceRange { min: Some(100.0), max: None });

        let range = parse("kurtka 100-200 zł").parameters.price.unwrap();
        assert_eq!(range, PriceRange { min: Some(100.0), max: Some(200.0) });

        let exact = parse("kurtka 300 zł");
        assert_eq!(exact.parameters.price.unwrap().max, Some(300.0));
        assert_eq!(exact.cleaned_query, "kurtka");

        let pln = parse("kurtka 250 PLN").parameters.price.unwrap();
        assert_eq!(pln.max, Some(250.0));
    }

    #[test]
    fn test_price_prefix_range() {
        let parsed = parse("cena: 100-200 kurtka");
        assert_eq!(
            parsed.parameters.price,
            Some(PriceRange {
                min: Some(100.0),
                max: Some(200.0)
            })
        );
        assert_eq!(parsed.cleaned_query, "kurtka");
    }

    #[test]
    fn test_price_prefix_without_number_is_ignored() {
        let parsed = parse("cena promocyjna");
        assert!(parsed.parameters.price.is_none());
        assert_eq!(parsed.cleaned_query, "cena promocyjna");
    }

    #[test]
    fn test_size_units() {
        let parsed = parse("buty 44 eu");
        assert_eq!(parsed.parameters.size.as_deref(), Some("44"));
        assert_eq!(parsed.cleaned_query, "buty");
    }

    #[test]
    fn test_disabled_parser() {
        let parser = QueryParser::new(QueryParserConfig::disabled());
        let parsed = parser.parse("  buty nike do 300 zł ");
        assert!(parsed.parameters.is_empty());
        assert_eq!(parsed.cleaned_query, "buty nike do 300 zł");
    }

    #[test]
    fn test_plain_query_untouched() {
        let parsed = parse("skarpetki wełniane");
        assert!(parsed.parameters.is_empty());
        assert_eq!(parsed.cleaned_query, "skarpetki wełniane");
    }

    #[test]
    fn test_russian_rules() {
        let parser = QueryParser::new(QueryParserConfig::russian());
        let parsed = parser.parse("кроссовки adidas черный до 5000 р");
        assert_eq!(parsed.parameters.brand.as_deref(), Some("adidas"));
        assert_eq!(parsed.parameters.color.as_deref(), Some("черный"));
        assert_eq!(parsed.parameters.price.unwrap().max, Some(5000.0));
        assert_eq!(parsed.cleaned_query, "кроссовки");
    }

    #[test]
    fn test_build_search_filters() {
        let parameters = QueryParameters {
            brand: Some("nike".to_string()),
            color: Some("czarny".to_string()),
            size: Some("42 eu".to_string()),
            price: Some(PriceRange {
                min: Some(100.0),
                max: Some(200.0),
            }),
        };
        let filters = QueryParser::build_search_filters(&parameters);
        assert_eq!(filters.brand.as_deref(), Some("nike"));
        assert_eq!(filters.colors, vec!["czarny"]);
        assert_eq!(filters.sizes, vec!["42"]);
        assert_eq!(filters.price_min, Some(100.0));
        assert_eq!(filters.price_max, Some(200.0));

        let size_without_digits = QueryParameters {
            size: Some("XL".to_string()),
            ..QueryParameters::default()
        };
        assert!(QueryParser::build_search_filters(&size_without_digits).sizes.is_empty());
    }

    #[test]
    fn test_tidy() {
        assert_eq!(tidy(" a ,  , b  c ,"), "a , b c");
        assert_eq!(tidy(",,x,,"), "x");
        assert_eq!(tidy("   "), "");
    }
}
