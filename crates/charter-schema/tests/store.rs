//! Store-backed validation through the free functions and a custom backend.

use std::io;
use std::sync::Arc;

use charter_schema::{
    get_model_from_store, merge_rules, validate_batch_with_store, validate_with_store,
    CharterError, InMemoryMetadataStore, MetadataStore, Mode, Registry, SchemaError,
    StoreError, StoreValidator,
};
use serde_json::{json, Value};

fn customer_store(schema_id: &str) -> InMemoryMetadataStore {
    let store = InMemoryMetadataStore::new();
    store
        .store_schema(
            schema_id,
            "1.0.0",
            json!({
                "title": "Customer",
                "type": "object",
                "required": ["name", "email"],
                "properties": {
                    "name": {"type": "string"},
                    "email": {"type": "string", "format": "email"},
                    "age": {"type": "integer"}
                }
            }),
        )
        .unwrap();
    store
        .store_coercion_rules(
            schema_id,
            "1.0.0",
            json!({"name": "strip_whitespace", "age": ["to_integer"]}),
        )
        .unwrap();
    store
        .store_validation_rules(
            schema_id,
            "1.0.0",
            json!({"rules": {"age": {"greater_than_or_equal_to": {"threshold": 18}}}, "version": "1.0.0"}),
        )
        .unwrap();
    store
}

#[test]
fn merged_rules_apply_during_validation() {
    let store = customer_store("store-merged");
    let result = validate_with_store(
        &store,
        "store-merged",
        &json!({"name": "  Ada ", "email": "ada@example.com", "age": "36"}),
        None,
        Mode::Lenient,
    )
    .unwrap();
    assert!(result.is_valid, "{:?}", result.errors);
    assert_eq!(result.data.unwrap()["age"], 36);

    let minor = validate_with_store(
        &store,
        "store-merged",
        &json!({"name": "Kid", "email": "kid@example.com", "age": 12}),
        Some("1.0.0"),
        Mode::Lenient,
    )
    .unwrap();
    assert_eq!(minor.errors[0].rule, "greater_than_or_equal_to");
}

#[test]
fn batch_uses_one_model() {
    let store = customer_store("store-batch");
    let items = vec![
        json!({"name": "a", "email": "a@example.com"}),
        json!({"name": "b"}),
    ];
    let results =
        validate_batch_with_store(&store, "store-batch", &items, None, Mode::Lenient).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap().is_valid);
    assert_eq!(results[1].as_ref().unwrap().errors[0].loc, "email");
}

#[test]
fn model_name_can_be_overridden() {
    let store = customer_store("store-named");
    let model = get_model_from_store(&store, "store-named", None, Some("Client")).unwrap();
    assert_eq!(model.name, "Client");
    assert!(model.version.is_some());
}

#[test]
fn latest_version_is_used_by_default() {
    let store = customer_store("store-versions");
    store
        .store_schema(
            "store-versions",
            "2.0.0",
            json!({"title": "CustomerV2", "type": "object", "properties": {"id": {"type": "string"}}}),
        )
        .unwrap();
    let latest = get_model_from_store(&store, "store-versions", None, None).unwrap();
    assert_eq!(latest.name, "CustomerV2");
    let pinned = get_model_from_store(&store, "store-versions", Some("1.0.0"), None).unwrap();
    assert_eq!(pinned.name, "Customer");
}

#[test]
fn missing_schema_or_version_is_not_found() {
    let store = customer_store("store-missing");
    for (id, version) in [("nobody", None), ("store-missing", Some("9.9.9"))] {
        let err = validate_with_store(&store, id, &json!({}), version, Mode::Lenient).unwrap_err();
        match err {
            CharterError::Store(StoreError::NotFound { schema_id, .. }) => assert_eq!(schema_id, id),
            other => panic!("expected not found, got {other:?}"),
        }
    }
}

#[test]
fn rules_for_undeclared_fields_are_rejected() {
    let err = merge_rules(
        &json!({"type": "object", "properties": {"a": {"type": "string"}}}),
        Some(&json!({"b": "to_lowercase"})),
        None,
    )
    .unwrap_err();
    assert_eq!(err, SchemaError::UnknownRuleTarget { field: "b".into() });
}

#[test]
fn rules_reach_nested_and_referenced_fields() {
    let merged = merge_rules(
        &json!({
            "type": "object",
            "definitions": {"Address": {"type": "object", "properties": {"city": {"type": "string"}}}},
            "properties": {"address": {"$ref": "#/definitions/Address"}}
        }),
        Some(&json!({"address.city": "to_uppercase"})),
        Some(&json!({"address.city": {"minLength": 2}})),
    )
    .unwrap();
    let city = &merged["properties"]["address"]["properties"]["city"];
    assert_eq!(city["coercion"], "to_uppercase");
    assert_eq!(city["minLength"], 2);
}

#[test]
fn validator_owns_its_cache_and_registry() {
    let registry = Arc::new(Registry::new());
    registry.register_fn("is_ada", |value, _| {
        if value == "ADA" {
            Ok(())
        } else {
            Err("only ada".to_string())
        }
    });
    let store = InMemoryMetadataStore::new();
    store
        .store_schema(
            "ada",
            "1",
            json!({"type": "object", "properties": {"name": {"type": "string"}}}),
        )
        .unwrap();
    store
        .store_coercion_rules("ada", "1", json!({"name": "to_uppercase"}))
        .unwrap();
    store
        .store_validation_rules("ada", "1", json!({"name": {"is_ada": null}}))
        .unwrap();

    let validator = StoreValidator::with_registry(store, registry);
    let ok = validator
        .validate("ada", &json!({"name": "ada"}), None, Mode::Lenient)
        .unwrap();
    assert!(ok.is_valid, "{:?}", ok.errors);
    let bad = validator
        .validate("ada", &json!({"name": "bob"}), None, Mode::Lenient)
        .unwrap();
    assert_eq!(bad.errors[0].msg, "only ada");
    assert_eq!(validator.cache().len(), 1);
}

/// A backend whose every call fails.
struct BrokenStore;

fn broken() -> StoreError {
    StoreError::backend(io::Error::new(io::ErrorKind::ConnectionRefused, "backend down"))
}

impl MetadataStore for BrokenStore {
    fn latest_version(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(broken())
    }

    fn get_schema(&self, _: &str, _: &str) -> Result<Option<Value>, StoreError> {
        Err(broken())
    }

    fn store_schema(&self, _: &str, _: &str, _: Value) -> Result<(), StoreError> {
        Err(broken())
    }

    fn get_coercion_rules(&self, _: &str, _: &str) -> Result<Option<Value>, StoreError> {
        Err(broken())
    }

    fn store_coercion_rules(&self, _: &str, _: &str, _: Value) -> Result<(), StoreError> {
        Err(broken())
    }

    fn get_validation_rules(&self, _: &str, _: &str) -> Result<Option<Value>, StoreError> {
        Err(broken())
    }

    fn store_validation_rules(&self, _: &str, _: &str, _: Value) -> Result<(), StoreError> {
        Err(broken())
    }
}

#[test]
fn backend_failure_propagates_unmodified() {
    let err = validate_with_store(&BrokenStore, "any", &json!({}), None, Mode::Lenient).unwrap_err();
    match err {
        CharterError::Store(StoreError::Backend(source)) => {
            let io = source.downcast_ref::<io::Error>().unwrap();
            assert_eq!(io.kind(), io::ErrorKind::ConnectionRefused);
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}
