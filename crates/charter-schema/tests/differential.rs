//! Keyword semantics checked against the `jsonschema` crate.
//!
//! Cases avoid the places where the engine deliberately differs from plain
//! JSON Schema: coercions, `null` for optional fields, and formats.

use std::sync::Arc;

use charter_schema::{validate, Compiler, Mode, Registry};
use serde_json::{json, Value};

fn agree(schema: Value, instances: &[Value]) {
    let model = Compiler::with_registry(Arc::new(Registry::new()))
        .compile(&schema)
        .unwrap();
    let oracle = jsonschema::validator_for(&schema).unwrap();
    for instance in instances {
        let ours = validate(&model, instance, Mode::Lenient).unwrap().is_valid;
        let theirs = oracle.is_valid(instance);
        assert_eq!(ours, theirs, "schema {schema} instance {instance}");
    }
}

#[test]
fn string_lengths_count_code_points() {
    agree(
        json!({"type": "object", "properties": {"s": {"type": "string", "minLength": 2, "maxLength": 3}}}),
        &[
            json!({"s": "a"}),
            json!({"s": "ab"}),
            json!({"s": "abc"}),
            json!({"s": "abcd"}),
            json!({"s": "éé"}),
            json!({"s": "日本語"}),
            json!({"s": "🦀🦀🦀🦀"}),
        ],
    );
}

#[test]
fn patterns_are_unanchored() {
    agree(
        json!({"type": "object", "properties": {"s": {"type": "string", "pattern": "[0-9]{3}"}}}),
        &[json!({"s": "abc123def"}), json!({"s": "12"}), json!({"s": "999"})],
    );
}

#[test]
fn numeric_bounds() {
    agree(
        json!({
            "type": "object",
            "properties": {
                "inclusive": {"type": "number", "minimum": 0, "maximum": 10},
                "exclusive": {"type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 10}
            }
        }),
        &[
            json!({"inclusive": 0, "exclusive": 5}),
            json!({"inclusive": 10, "exclusive": 9.999}),
            json!({"inclusive": -0.5}),
            json!({"inclusive": 10.5}),
            json!({"exclusive": 0}),
            json!({"exclusive": 10}),
            json!({"exclusive": 0.001}),
        ],
    );
}

#[test]
fn enum_and_const() {
    agree(
        json!({
            "type": "object",
            "properties": {
                "color": {"enum": ["red", "green"]},
                "answer": {"const": 42}
            }
        }),
        &[
            json!({"color": "red", "answer": 42}),
            json!({"color": "blue"}),
            json!({"answer": 41}),
            json!({"answer": 42.0}),
        ],
    );
}

#[test]
fn array_keywords() {
    agree(
        json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": 3,
                    "uniqueItems": true,
                    "items": {"type": "string"}
                }
            }
        }),
        &[
            json!({"tags": ["a"]}),
            json!({"tags": []}),
            json!({"tags": ["a", "b", "c", "d"]}),
            json!({"tags": ["a", "a"]}),
            json!({"tags": ["a", 1]}),
        ],
    );
}

#[test]
fn unique_items_compare_numbers_by_value() {
    agree(
        json!({"type": "object", "properties": {"xs": {"type": "array", "uniqueItems": true}}}),
        &[json!({"xs": [1, 1.0]}), json!({"xs": [1, 2]}), json!({"xs": [{"a": 1}, {"a": 1}]})],
    );
}

#[test]
fn required_and_types() {
    agree(
        json!({
            "type": "object",
            "required": ["id", "flag"],
            "properties": {
                "id": {"type": "integer"},
                "flag": {"type": "boolean"},
                "nested": {
                    "type": "object",
                    "required": ["x"],
                    "properties": {"x": {"type": "string"}}
                }
            }
        }),
        &[
            json!({"id": 1, "flag": true}),
            json!({"id": 1}),
            json!({"id": "1", "flag": false}),
            json!({"id": 1, "flag": "yes"}),
            json!({"id": 1, "flag": true, "nested": {}}),
            json!({"id": 1, "flag": true, "nested": {"x": "y"}}),
            json!({"id": 1.5, "flag": true}),
            json!([]),
        ],
    );
}
