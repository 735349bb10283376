//! Dot-path extraction from catalog API responses.
//!
//! Remote catalogs nest their results at different depths and name fields
//! differently; these helpers let a provider describe where things live with
//! a path such as `"data.tracks.items"` instead of a bespoke struct per API.
//! Numeric path segments index into arrays.
//!
//! # Examples
//!
//! ```rust
//! use ensemble::net::json;
//! use serde_json::json;
//!
//! let data = json!({
//!     "tracks": {
//!         "items": [
//!             { "id": 5551234, "title": "Come Together", "artist": { "name": "The Beatles" } }
//!         ]
//!     }
//! });
//!
//! let items = json::extract_array(&data, "tracks.items");
//! assert_eq!(items.len(), 1);
//! assert_eq!(json::extract_string(&items[0], "id").as_deref(), Some("5551234"));
//! assert_eq!(json::extract_string(&data, "tracks.items.0.artist.name").as_deref(), Some("The Beatles"));
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Extracts a value from nested JSON using dot notation.
///
/// An empty path returns the value itself.
pub fn extract_path(json: &Value, path: &str) -> Option<Value> {
    let mut current = json;

    for key in path.split('.').filter(|k| !k.is_empty()) {
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            other => other.get(key)?,
        };
    }

    Some(current.clone())
}

/// Extracts and deserializes a value from a nested JSON path.
///
/// # Errors
///
/// * [`Error::Parse`](crate::Error::Parse) - If the path doesn't exist
/// * [`Error::Json`](crate::Error::Json) - If deserialization fails
pub fn extract_as<T>(json: &Value, path: &str) -> crate::Result<T>
where
    T: DeserializeOwned,
{
    extract_path(json, path)
        .ok_or_else(|| crate::Error::parse(format!("Path not found: {}", path)))
        .and_then(|v| serde_json::from_value(v).map_err(Into::into))
}

/// Extracts an array, or an empty vector when the path is missing or not an array.
pub fn extract_array(json: &Value, path: &str) -> Vec<Value> {
    extract_path(json, path)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
}

/// Extracts a scalar as a string.
///
/// Catalog ids come back as numbers from some APIs and strings from others;
/// both are accepted. Blank strings count as missing.
pub fn extract_string(json: &Value, path: &str) -> Option<String> {
    match extract_path(json, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
