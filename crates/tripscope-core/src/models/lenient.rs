//! Tolerant field deserializers for upstream documents
//!
//! Upstream documents are written by several producers and field types drift
//! (numbers stored as strings, objects replaced by scalars). These helpers turn
//! anything unexpected into `None` instead of failing the whole document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Any `T`, or `None` when the value does not fit
pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Strings, with numbers and booleans rendered as text
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_string(&Value::deserialize(deserializer)?))
}

/// Numbers, with numeric strings parsed
pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_number(&Value::deserialize(deserializer)?))
}

/// Raw value, dropping explicit nulls
pub fn value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok((!value.is_null()).then_some(value))
}

pub(crate) fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Epoch seconds from `{_seconds, _nanoseconds}`, `{seconds}`, a bare number or an
/// RFC 3339 string
pub fn epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Object(map) => map
            .get("_seconds")
            .or_else(|| map.get("seconds"))
            .and_then(as_number)
            .map(|s| s as i64),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp())
            .or_else(|| s.trim().parse::<i64>().ok()),
        _ => None,
    }
}
