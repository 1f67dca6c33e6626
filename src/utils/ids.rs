//! Canonical identifier handling.
//!
//! External systems hand out ids as JSON numbers or strings depending on the
//! endpoint. Every id is normalised to `String` while deserializing so the rest
//! of the crate can compare ids with plain equality.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

fn value_to_id(value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(format!("expected string or number id, got {other}")),
    }
}

/// Deserializes a required id given as a string or a number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_id(value)
        .map_err(D::Error::custom)?
        .ok_or_else(|| D::Error::custom("missing id"))
}

/// Deserializes an optional id given as a string, a number, or null.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(v) => value_to_id(v).map_err(D::Error::custom),
    }
}

/// Normalises an id that arrived as free text (callback data, commands).
#[must_use]
pub fn normalize_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
