//! JSON value helpers shared by the constraint, engine, and coercion modules.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// JSON type name used in error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Compare two JSON numbers by numeric value.
///
/// Integer pairs compare exactly; anything involving a float compares as
/// `f64`. Returns `None` only for NaN, which `serde_json` never produces.
pub(crate) fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Structural equality with numeric equality across representations
/// (`1 == 1.0`), recursing into arrays and objects.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

/// If `n` is a float with no fractional part, return the equal integer.
pub(crate) fn integral(n: &Number) -> Option<Number> {
    if n.is_i64() || n.is_u64() {
        return Some(n.clone());
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.223_372_036_854_776e18 {
        Some(Number::from(f as i64))
    } else {
        None
    }
}

/// Append an object key to a dotted location.
pub(crate) fn join_key(loc: &str, key: &str) -> String {
    if loc.is_empty() {
        key.to_string()
    } else {
        format!("{loc}.{key}")
    }
}

/// Append an array index to a location.
pub(crate) fn join_index(loc: &str, index: usize) -> String {
    format!("{loc}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_and_float_compare_equal() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!(1.5)));
        assert!(values_equal(&json!([1, {"a": 2.0}]), &json!([1.0, {"a": 2}])));
    }

    #[test]
    fn type_names() {
        assert_eq!(type_name(&json!(3)), "integer");
        assert_eq!(type_name(&json!(3.5)), "number");
        assert_eq!(type_name(&json!(null)), "null");
    }

    #[test]
    fn integral_detects_whole_floats() {
        assert_eq!(integral(&Number::from_f64(3.0).unwrap()), Some(Number::from(3)));
        assert_eq!(integral(&Number::from_f64(3.5).unwrap()), None);
    }

    #[test]
    fn locations_join() {
        assert_eq!(join_key("", "name"), "name");
        assert_eq!(join_key("address", "city"), "address.city");
        assert_eq!(join_key(&join_index("items", 2), "sku"), "items[2].sku");
    }
}
