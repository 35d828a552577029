//! # Canonical Serialization — JCS-Compatible Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in schema fingerprinting.
//!
//! ## Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which applies number
//! normalization before JCS serialization. Any function that needs canonical
//! bytes must accept `&CanonicalBytes`, so a fingerprint can never be taken
//! over a pretty-printed or insertion-ordered rendering by accident.
//!
//! ## Normalization Rules
//!
//! 1. **Integral floats become integers** — `1.0` and `1` denote the same
//!    schema constraint (`"minimum": 1.0` vs `"minimum": 1`) and must
//!    fingerprint identically.
//! 2. **Non-integral floats pass through** — JCS serializes them with the
//!    ECMAScript shortest round-trip form.
//! 3. **Objects and arrays recurse.**
//!
//! After normalization, `serde_jcs` produces RFC 8785 output: sorted keys,
//! compact separators, deterministic byte sequence.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with number
/// normalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Integral numbers are always rendered as integers.
/// - Serialization uses sorted keys with compact separators (RFC 8785).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value cannot
    /// be represented as JSON or JCS serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let normalized = normalize_json_value(value);
        let bytes = serialize_canonical(&normalized)?;
        Ok(Self(bytes))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively normalize numbers so equal constraints serialize identically.
fn normalize_json_value(value: Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => value,
        Value::Number(n) => Value::Number(normalize_number(n)),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_json_value(v)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.into_iter().map(normalize_json_value).collect()),
    }
}

fn normalize_number(n: Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n;
    }
    match n.as_f64() {
        // 2^63 bounds the range where the float is exactly an i64.
        Some(f) if f.fract() == 0.0 && f.abs() < 9.223_372_036_854_776e18 => {
            Number::from(f as i64)
        }
        _ => n,
    }
}

/// Serialize a JSON value in JCS-canonical form (RFC 8785).
fn serialize_canonical(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let s = serde_jcs::to_string(value)?;
    Ok(s.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_str(value: &Value) -> String {
        let cb = CanonicalBytes::new(value).expect("should canonicalize");
        String::from_utf8(cb.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_canonical_bytes_sorted_keys() {
        let data = serde_json::json!({"type": "object", "title": "User", "required": []});
        assert_eq!(
            canonical_str(&data),
            r#"{"required":[],"title":"User","type":"object"}"#
        );
    }

    #[test]
    fn test_canonical_bytes_nested() {
        let data = serde_json::json!({
            "properties": {"name": {"type": "string", "minLength": 3}},
            "type": "object"
        });
        assert_eq!(
            canonical_str(&data),
            r#"{"properties":{"name":{"minLength":3,"type":"string"}},"type":"object"}"#
        );
    }

    #[test]
    fn test_integral_float_normalized() {
        let a = serde_json::json!({"minimum": 1.0});
        let b = serde_json::json!({"minimum": 1});
        assert_eq!(canonical_str(&a), canonical_str(&b));
        assert_eq!(canonical_str(&a), r#"{"minimum":1}"#);
    }

    #[test]
    fn test_fractional_float_preserved() {
        let data = serde_json::json!({"maximum": 99.5});
        assert_eq!(canonical_str(&data), r#"{"maximum":99.5}"#);
    }

    #[test]
    fn test_negative_integral_float() {
        let data = serde_json::json!({"minimum": -3.0});
        assert_eq!(canonical_str(&data), r#"{"minimum":-3}"#);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(canonical_str(&serde_json::json!({})), "{}");
        assert_eq!(canonical_str(&serde_json::json!([])), "[]");
    }

    #[test]
    fn test_len_and_is_empty() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        assert!(!cb.is_empty());
        assert_eq!(cb.len(), 7);
    }

    #[test]
    fn test_unicode_passthrough() {
        let data = serde_json::json!({"title": "Caf\u{00e9}"});
        assert!(canonical_str(&data).contains('\u{00e9}'));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            (-1.0e6f64..1.0e6).prop_map(|f| serde_json::json!(f)),
            "[a-zA-Z0-9_ ]{0,30}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// Same input always produces the same bytes.
        #[test]
        fn canonical_bytes_deterministic(value in json_value()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        /// Canonical bytes parse back as JSON.
        #[test]
        fn canonical_bytes_valid_json(value in json_value()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            let parsed: Result<Value, _> = serde_json::from_slice(cb.as_bytes());
            prop_assert!(parsed.is_ok(), "Not valid JSON: {:?}", parsed.err());
        }

        /// Canonicalizing canonical output is a fixed point.
        #[test]
        fn canonical_bytes_idempotent(value in json_value()) {
            let once = CanonicalBytes::new(&value).unwrap();
            let reparsed: Value = serde_json::from_slice(once.as_bytes()).unwrap();
            let twice = CanonicalBytes::new(&reparsed).unwrap();
            prop_assert_eq!(once.as_bytes(), twice.as_bytes());
        }
    }
}
