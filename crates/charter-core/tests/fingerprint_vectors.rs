//! # Fingerprint Test Vectors
//!
//! Hardcoded SHA-256 digests of RFC 8785 canonical bytes. If these change,
//! every cached model and every stored version tag changes with them.

use charter_core::{fingerprint, sha256_digest, CanonicalBytes};
use proptest::prelude::*;
use serde_json::{json, Value};

fn digest_hex(data: &impl serde::Serialize) -> String {
    let cb = CanonicalBytes::new(data).expect("canonicalization should succeed");
    sha256_digest(&cb).to_hex()
}

#[test]
fn empty_object() {
    assert_eq!(
        digest_hex(&json!({})),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn empty_array() {
    assert_eq!(
        digest_hex(&json!([])),
        "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945"
    );
}

#[test]
fn keys_are_sorted() {
    let expected = "1cc69c7fa23616ca2ec3ee70d24390a6225c8832db8a4c814c7e0e7f942f8668";
    assert_eq!(digest_hex(&json!({"a": 1, "b": [true, null]})), expected);
    assert_eq!(digest_hex(&json!({"b": [true, null], "a": 1})), expected);
}

#[test]
fn integral_floats_fingerprint_as_integers() {
    let expected = "2a1379ebe9f4b632fbdf3732d4b86b26e9fbf2aa92cf2449dde7bf4dc122060f";
    assert_eq!(digest_hex(&json!({"type": "integer", "minimum": 1})), expected);
    assert_eq!(digest_hex(&json!({"type": "integer", "minimum": 1.0})), expected);
}

#[test]
fn canonical_bytes_are_compact() {
    let cb = CanonicalBytes::new(&json!({"z": {"y": 1, "x": [1, 2]}, "a": "b"})).unwrap();
    assert_eq!(cb.as_bytes(), br#"{"a":"b","z":{"x":[1,2],"y":1}}"#);
}

#[test]
fn display_carries_algorithm_tag() {
    let digest = fingerprint(&json!({"title": "User"})).unwrap();
    let text = digest.to_string();
    assert_eq!(text, format!("sha256:{}", digest.to_hex()));
    assert!(text.ends_with(&digest.to_hex()));
    assert_eq!(digest.short().len(), 12);
    assert!(digest.to_hex().starts_with(&digest.short()));
}

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn key_order_never_changes_the_fingerprint(
        entries in prop::collection::btree_map("[a-z]{1,6}", json_leaf(), 0..8)
    ) {
        let forward: serde_json::Map<String, Value> =
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let reverse: serde_json::Map<String, Value> =
            entries.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();
        prop_assert_eq!(
            fingerprint(&forward).unwrap(),
            fingerprint(&reverse).unwrap()
        );
    }
}
