//! Decoding loosely typed step parameters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::{Params, CONTEXT_KEY};

/// Non-empty string parameter.
pub fn str_param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn required_str<'a>(params: &'a Params, key: &str) -> Result<&'a str> {
    str_param(params, key).ok_or_else(|| {
        SwitchyardError::InvalidParams(format!("missing required parameter '{}'", key))
    })
}

/// Unsigned integer given either as a JSON number or a numeric string.
pub fn usize_param(params: &Params, key: &str) -> Option<usize> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String list given as an array or a single comma-separated string.
pub fn string_list(params: &Params, key: &str) -> Vec<String> {
    match params.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Search text: `keyword`, else `query`, else empty.
pub fn query_text(params: &Params) -> String {
    str_param(params, "keyword")
        .or_else(|| str_param(params, "query"))
        .unwrap_or("")
        .to_string()
}

/// Parse a timestamp given as RFC 3339, a naive date-time (taken as UTC),
/// or a plain date (UTC midnight).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Optional timestamp parameter. A present but unparseable value is an error.
pub fn date_param(params: &Params, key: &str) -> Result<Option<DateTime<Utc>>> {
    match str_param(params, key) {
        None => Ok(None),
        Some(raw) => parse_datetime(raw).map(Some).ok_or_else(|| {
            SwitchyardError::InvalidParams(format!("'{}' is not a valid date: {}", key, raw))
        }),
    }
}

/// Upstream payloads injected under `_context`, ordered by step index so
/// that `step_2` precedes `step_10`. A list payload contributes its first
/// element.
pub fn context_items(params: &Params) -> Vec<&Value> {
    let Some(Value::Object(context)) = params.get(CONTEXT_KEY) else {
        return Vec::new();
    };
    let mut entries: Vec<(&String, &Value)> = context.iter().collect();
    entries.sort_by_key(|(id, _)| step_index(id).unwrap_or(usize::MAX));
    entries
        .into_iter()
        .filter_map(|(_, payload)| match payload {
            Value::Array(items) => items.first(),
            other => Some(other),
        })
        .collect()
}

fn step_index(id: &str) -> Option<usize> {
    id.strip_prefix("step_")?.parse().ok()
}

/// Explicit id parameter, else the id carried by the first upstream item
/// that has one.
pub fn resource_id(params: &Params, key: &str) -> Result<String> {
    if let Some(id) = str_param(params, key) {
        return Ok(id.to_string());
    }
    context_items(params)
        .into_iter()
        .find_map(|item| {
            item.get(key)
                .or_else(|| item.get("external_id"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map(String::from)
        .ok_or_else(|| {
            SwitchyardError::InvalidParams(format!(
                "missing required parameter '{}' and no upstream result carries one",
                key
            ))
        })
}
