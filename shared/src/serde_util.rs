//! Lenient deserializers for backend payloads
//!
//! The platform API is not strict about identifier types (numbers and
//! strings both show up) and occasionally sends `null` or an object where a
//! list is expected. These helpers absorb that drift at the edge so the rest
//! of the client works with plain Rust types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a JSON string or number and yields it as a `String`.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Optional variant of [`string_or_number`]; `null` and other shapes map to `None`.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Deserializes a list, coercing anything that is not an array to an empty
/// list. Elements that fail to parse are dropped.
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Like [`lenient_list`] but keeps the difference between "no list" (`None`)
/// and "an empty list" (`Some(vec![])`).
pub fn lenient_opt_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "opt_string_or_number")]
        parent: Option<String>,
        #[serde(default, deserialize_with = "lenient_list")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "lenient_opt_list")]
        extra: Option<Vec<u32>>,
    }

    #[test]
    fn test_numeric_ids_become_strings() {
        let probe: Probe = serde_json::from_str(r#"{"id": 42, "parent": 7}"#).unwrap();
        assert_eq!(probe.id, "42");
        assert_eq!(probe.parent.as_deref(), Some("7"));
    }

    #[test]
    fn test_non_list_coerced_to_empty() {
        let probe: Probe =
            serde_json::from_str(r#"{"id": "a", "tags": {"oops": true}, "extra": "x"}"#).unwrap();
        assert!(probe.tags.is_empty());
        assert!(probe.extra.is_none());
    }

    #[test]
    fn test_bad_elements_dropped() {
        let probe: Probe =
            serde_json::from_str(r#"{"id": "a", "tags": ["ok", 3, "fine"], "extra": []}"#).unwrap();
        assert_eq!(probe.tags, vec!["ok", "fine"]);
        assert_eq!(probe.extra, Some(vec![]));
    }

    #[test]
    fn test_missing_fields_default() {
        let probe: Probe = serde_json::from_str(r#"{"id": "a", "parent": null}"#).unwrap();
        assert!(probe.parent.is_none());
        assert!(probe.tags.is_empty());
        assert!(probe.extra.is_none());
    }
}
