use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// First value found at any of `pointers`, skipping nulls.
pub fn first_pointer<'a>(value: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .find(|v| !v.is_null())
}

/// First non-blank string found at any of `pointers`.
pub fn first_str<'a>(value: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// First non-blank string found at any of `pointers`, returned as stored.
pub fn first_text<'a>(value: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// First count found at any of `pointers`.
pub fn first_count(value: &Value, pointers: &[&str]) -> Option<u64> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .find_map(count_value)
}

/// Reads a non-negative count from a number or a numeric string.
pub fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Identifier that may arrive as a string or a bare number.
pub fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(parse_timestamp_i64),
        Value::String(s) => s.trim().parse::<i64>().ok().and_then(parse_timestamp_i64),
        _ => None,
    }
}

/// Unix seconds; non-positive values mean "unknown".
pub fn parse_timestamp_i64(num: i64) -> Option<DateTime<Utc>> {
    if num <= 0 {
        return None;
    }
    Utc.timestamp_opt(num, 0).single()
}

pub fn iso_utc(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
