//! Small typed extractors over untyped object data. Dynamic resources decode
//! into nested JSON values; these helpers keep that untyped access contained
//! so the rest of the controller sees only typed fields.

use serde_json::{Map, Value};

/// Walks a path of object keys, returning the value at the end.
pub fn nested<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    let mut current = value;
    for key in path {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

pub fn get_map<'v>(value: &'v Value, key: &str) -> Option<&'v Map<String, Value>> {
    value.as_object()?.get(key)?.as_object()
}

pub fn get_slice<'v>(value: &'v Value, key: &str) -> Option<&'v Vec<Value>> {
    value.as_object()?.get(key)?.as_array()
}

pub fn get_str<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.as_object()?.get(key)?.as_str()
}

pub fn get_string(value: &Value, key: &str) -> String {
    get_str(value, key).unwrap_or_default().to_string()
}

pub fn get_bool(value: &Value, key: &str) -> bool {
    value
        .as_object()
        .and_then(|o| o.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Integer extraction tolerating the integer and floating-point encodings
/// generic decoding produces.
pub fn get_i64(value: &Value, key: &str) -> Option<i64> {
    match value.as_object()?.get(key)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().map(|f| f as i64)
            }
        }
        _ => None,
    }
}

pub fn get_string_slice(value: &Value, key: &str) -> Vec<String> {
    get_slice(value, key)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
