//! Raw-value parsers for the `HARBOR_BOOST_*` environment grammar.
//!
//! Lists are `;`-separated, dicts are `k=v,…` pairs with bool/int/float
//! coercion, and wildcard names collect every `PREFIX_*` variable in
//! sorted-name order.

use serde_json::{Map, Number, Value};

/// Splits a `;`-separated list, trimming items and dropping empties.
pub fn parse_str_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `true`/`1`/`yes`/`on` (case-insensitive) as true.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Coerces a scalar string: bool, then integer, then float, else string.
pub fn coerce_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(Number::from(i));
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(trimmed.to_string())
}

/// Parses a `k=v,…` dict with scalar coercion. Pairs without `=` are skipped.
pub fn parse_config_dict(raw: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for pair in raw.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        out.insert(key.to_string(), coerce_scalar(value));
    }
    out
}

/// Reads a single variable with a default.
pub fn env_str(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Collects values of every `PREFIX<suffix>` variable, sorted by name.
pub fn env_wildcard(prefix: &str) -> Vec<String> {
    let mut matching: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect();
    matching.sort_by(|a, b| a.0.cmp(&b.0));
    matching.into_iter().map(|(_, value)| value).collect()
}
