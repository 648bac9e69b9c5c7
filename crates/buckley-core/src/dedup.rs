// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Argument canonicalization for the Tool Runner's dedup-key.
//!
//! Canonicalization sorts object keys recursively and normalizes number and
//! boolean representations before hashing, so that `{"a":1,"b":2}` and
//! `{"b":2,"a":1}` canonicalize identically.

use serde_json::Value;

/// Canonicalize a JSON value into a deterministic string suitable for use as
/// (half of) a dedup key.
pub fn canonicalize_arguments(value: &Value) -> String {
    canonical_value(value).to_string()
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonical_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Number(n) => {
            // Normalize e.g. 1.0 and 1 to the same textual form.
            if let Some(i) = n.as_i64() {
                Value::Number(serde_json::Number::from(i))
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Value::Number(serde_json::Number::from(f as i64))
                } else {
                    value.clone()
                }
            } else {
                value.clone()
            }
        }
        other => other.clone(),
    }
}

/// A dedup key combining the tool name with its canonicalized arguments.
pub fn dedup_key(tool_name: &str, arguments: &Value) -> String {
    format!("{tool_name}:{}", canonicalize_arguments(arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reordered_object_keys_canonicalize_identically() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonicalize_arguments(&a), canonicalize_arguments(&b));
    }

    #[test]
    fn nested_objects_canonicalize_recursively() {
        let a = json!({"outer": {"x": 1, "y": 2}, "z": 3});
        let b = json!({"z": 3, "outer": {"y": 2, "x": 1}});
        assert_eq!(canonicalize_arguments(&a), canonicalize_arguments(&b));
    }

    #[test]
    fn integer_and_float_representations_normalize_equal() {
        let a = json!({"n": 1});
        let b = json!({"n": 1.0});
        assert_eq!(canonicalize_arguments(&a), canonicalize_arguments(&b));
    }

    #[test]
    fn different_values_canonicalize_differently() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(canonicalize_arguments(&a), canonicalize_arguments(&b));
    }

    #[test]
    fn dedup_key_includes_tool_name() {
        let args = json!({"a": 1});
        assert_ne!(dedup_key("tool_a", &args), dedup_key("tool_b", &args));
    }
}
