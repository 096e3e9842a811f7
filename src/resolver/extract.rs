//! Pulling a single value out of a secret payload.

use serde_json::{Map, Value};

/// Key read when a reference names no field
pub const DEFAULT_FIELD: &str = "value";

/// Keys Vault always puts in the `metadata` object of a KV v2 read
const KV2_METADATA_KEYS: [&str; 4] = ["created_time", "deletion_time", "destroyed", "version"];

/// Unwrap a KV v2 payload (`{"data": {...}, "metadata": {...}}`) one level.
///
/// The nested `data` object is used only when it sits next to a `metadata` object
/// carrying the KV v2 version keys. A KV v1 secret with a `data` key is returned
/// unchanged.
pub fn unwrap_kv2(data: &Map<String, Value>) -> &Map<String, Value> {
    match (data.get("data"), data.get("metadata")) {
        (Some(Value::Object(inner)), Some(Value::Object(metadata)))
            if KV2_METADATA_KEYS.iter().all(|key| metadata.contains_key(*key)) =>
        {
            inner
        }
        _ => data,
    }
}

/// Extract the value a reference asks for.
///
/// Without a field the conventional `value` key is used, else the only key of a
/// single-entry secret. Several keys and no field is an error.
pub fn extract_value(data: &Map<String, Value>, field: Option<&str>) -> Result<String, String> {
    let data = unwrap_kv2(data);

    match field {
        Some(field) => {
            let value = lookup(data, field).ok_or_else(|| format!("field '{}' not found", field))?;
            render(value, field)
        }
        None => {
            if let Some(value) = data.get(DEFAULT_FIELD) {
                return render(value, DEFAULT_FIELD);
            }
            let mut entries = data.iter();
            match (entries.next(), entries.next()) {
                (None, _) => Err("secret has no data".to_string()),
                (Some((key, value)), None) => render(value, key),
                (Some(_), Some(_)) => Err(format!(
                    "secret has {} keys and no '{}' key, select one with '!/<field>'",
                    data.len(),
                    DEFAULT_FIELD
                )),
            }
        }
    }
}

/// Exact key first, then a dotted path such as `db.hosts[0]` (optional `$.` prefix)
fn lookup<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(value) = data.get(field) {
        return Some(value);
    }

    let path = field.strip_prefix("$.").unwrap_or(field);
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = step(data.get(key_of(first))?, first)?;

    for segment in segments {
        let next = current.as_object()?.get(key_of(segment))?;
        current = step(next, segment)?;
    }
    Some(current)
}

/// Key part of a segment: `hosts[0]` -> `hosts`
fn key_of(segment: &str) -> &str {
    segment.split('[').next().unwrap_or(segment)
}

/// Apply the `[n]` indexes of a segment
fn step<'a>(mut value: &'a Value, segment: &str) -> Option<&'a Value> {
    for index in segment.split('[').skip(1) {
        let index: usize = index.strip_suffix(']')?.parse().ok()?;
        value = value.as_array()?.get(index)?;
    }
    Some(value)
}

fn render(value: &Value, field: &str) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(format!("field '{}' is null", field)),
        Value::Object(_) | Value::Array(_) => Err(format!("field '{}' is not a scalar value", field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_value_convention() {
        let data = map(json!({"value": "TestValue"}));
        assert_eq!(extract_value(&data, None).unwrap(), "TestValue");
    }

    #[test]
    fn test_kv2_unwrap() {
        let data = map(json!({
            "data": {"value": "TestValue", "other": "x"},
            "metadata": {"created_time": "2024-01-01T00:00:00Z", "deletion_time": "", "destroyed": false, "version": 1}
        }));
        assert_eq!(extract_value(&data, None).unwrap(), "TestValue");
        assert_eq!(extract_value(&data, Some("other")).unwrap(), "x");
    }

    #[test]
    fn test_field_named_data_is_not_unwrapped() {
        let data = map(json!({"data": {"a": "b"}, "owner": "team"}));
        assert_eq!(extract_value(&data, Some("owner")).unwrap(), "team");
    }

    #[test]
    fn test_kv1_secret_with_data_key_is_not_unwrapped() {
        let data = map(json!({"data": {"user": "svc"}}));
        assert_eq!(extract_value(&data, Some("data.user")).unwrap(), "svc");

        let partial = map(json!({"data": {"user": "svc"}, "metadata": {"version": 2}}));
        assert_eq!(extract_value(&partial, Some("data.user")).unwrap(), "svc");
        assert_eq!(extract_value(&partial, Some("metadata.version")).unwrap(), "2");
    }

    #[test]
    fn test_single_key_without_field() {
        let data = map(json!({"password": "hunter2"}));
        assert_eq!(extract_value(&data, None).unwrap(), "hunter2");
    }

    #[test]
    fn test_ambiguous_without_field() {
        let data = map(json!({"first": "1", "second": "2"}));
        let error = extract_value(&data, None).unwrap_err();
        assert!(error.contains("2 keys"));
    }

    #[test]
    fn test_empty_secret() {
        assert_eq!(extract_value(&Map::new(), None).unwrap_err(), "secret has no data");
    }

    #[test]
    fn test_missing_and_non_scalar_fields() {
        let data = map(json!({"a": null, "b": {"c": 1}, "list": [1, 2]}));
        assert_eq!(extract_value(&data, Some("missing")).unwrap_err(), "field 'missing' not found");
        assert_eq!(extract_value(&data, Some("a")).unwrap_err(), "field 'a' is null");
        assert!(extract_value(&data, Some("b")).unwrap_err().contains("not a scalar"));
    }

    #[test]
    fn test_scalars_are_rendered() {
        let data = map(json!({"port": 5432, "tls": true}));
        assert_eq!(extract_value(&data, Some("port")).unwrap(), "5432");
        assert_eq!(extract_value(&data, Some("tls")).unwrap(), "true");
    }

    #[test]
    fn test_dotted_paths() {
        let data = map(json!({
            "db": {"hosts": ["primary", "replica"], "user": "app"},
            "dotted.key": "exact"
        }));
        assert_eq!(extract_value(&data, Some("db.user")).unwrap(), "app");
        assert_eq!(extract_value(&data, Some("$.db.hosts[1]")).unwrap(), "replica");
        assert_eq!(extract_value(&data, Some("dotted.key")).unwrap(), "exact");
        assert!(extract_value(&data, Some("db.hosts[5]")).is_err());
    }
}
