//! # Reverse Converter
//!
//! Rebuilds a schema document from a [`CompiledModel`]. Compiling the output
//! again gives a model with the same names, field order, constraints,
//! pipelines, and defaults. Keywords the compiler never interpreted are not
//! part of the model and do not come back.
//!
//! Nested models are written once under the root's `$defs`, keyed by model
//! name, and every use site is a `$ref` carrying the field's own keywords.
//! A shared model keeps its own description.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CharterError;
use crate::model::{AdditionalProperties, CompiledModel, Field, PipelineStep, ValueSpec};

/// Convert a model to a schema document.
pub fn to_document(model: &CompiledModel) -> Value {
    let mut defs = Map::new();
    let mut doc = model_document(model, &mut defs);
    if !defs.is_empty() {
        doc.insert("$defs".into(), Value::Object(defs));
    }
    Value::Object(doc)
}

/// Convert a model to schema text. `None` gives compact output, `Some(n)`
/// indents nested levels by `n` spaces.
pub fn to_json(model: &CompiledModel, indent: Option<usize>) -> Result<String, CharterError> {
    let document = to_document(model);
    let Some(width) = indent else {
        return Ok(serde_json::to_string(&document)?);
    };
    let indent = " ".repeat(width);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    document.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|e| {
        CharterError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Write schema text to `path`, creating parent directories.
pub fn to_file(
    model: &CompiledModel,
    path: impl AsRef<Path>,
    indent: Option<usize>,
) -> Result<(), CharterError> {
    let path = path.as_ref();
    let text = to_json(model, indent)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    tracing::debug!(model = %model.name, path = %path.display(), "wrote schema document");
    Ok(())
}

fn model_document(model: &CompiledModel, defs: &mut Map<String, Value>) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("title".into(), Value::from(model.name.clone()));
    doc.insert("type".into(), Value::from("object"));
    if let Some(description) = &model.description {
        doc.insert("description".into(), Value::from(description.clone()));
    }

    let mut properties = Map::new();
    for field in &model.fields {
        properties.insert(field.name.clone(), Value::Object(field_document(field, defs)));
    }
    doc.insert("properties".into(), Value::Object(properties));

    let required: Vec<Value> = model
        .fields
        .iter()
        .filter(|f| f.required)
        .map(|f| Value::from(f.name.clone()))
        .collect();
    if !required.is_empty() {
        doc.insert("required".into(), Value::Array(required));
    }
    match model.additional {
        AdditionalProperties::Ignore => {}
        AdditionalProperties::Forbid => {
            doc.insert("additionalProperties".into(), Value::Bool(false));
        }
        AdditionalProperties::Allow => {
            doc.insert("additionalProperties".into(), Value::Bool(true));
        }
    }
    doc
}

fn field_document(field: &Field, defs: &mut Map<String, Value>) -> Map<String, Value> {
    let mut doc = spec_document(&field.spec, defs);
    if let Some(description) = &field.description {
        doc.insert("description".into(), Value::from(description.clone()));
    }
    if let Some(default) = field.default.value() {
        doc.insert("default".into(), default.clone());
    }
    doc
}

fn spec_document(spec: &ValueSpec, defs: &mut Map<String, Value>) -> Map<String, Value> {
    let mut doc = Map::new();
    let kind = Value::from(spec.kind.as_str());
    match &spec.model {
        Some(model) => {
            if !defs.contains_key(&model.name) {
                let definition = model_document(model, defs);
                defs.insert(model.name.clone(), Value::Object(definition));
            }
            doc.insert("$ref".into(), Value::from(definition_pointer(&model.name)));
            if spec.nullable {
                doc.insert("type".into(), Value::Array(vec![kind, Value::from("null")]));
            }
        }
        None if spec.nullable => {
            doc.insert("type".into(), Value::Array(vec![kind, Value::from("null")]));
        }
        None => {
            doc.insert("type".into(), kind);
        }
    }

    for constraint in &spec.constraints {
        doc.insert(constraint.keyword().into(), constraint.to_keyword_value());
    }

    // Leading coercions go back to `coercion`; everything from the first
    // pre-phase check on becomes ordered pre-phase `x-validators`.
    let mut coercions = Vec::new();
    let mut validators = Vec::new();
    for step in &spec.pipeline {
        match step {
            PipelineStep::Coerce(c) if c.implicit => {}
            PipelineStep::Coerce(c) if validators.is_empty() => {
                coercions.push(Value::from(c.name.clone()));
            }
            PipelineStep::Coerce(c) => {
                validators.push(extension_entry(&c.name, "pre", &Value::Null));
            }
            PipelineStep::Check(call) => {
                validators.push(extension_entry(&call.name, "pre", &call.params));
            }
        }
    }
    for call in &spec.post {
        validators.push(extension_entry(&call.name, "post", &call.params));
    }
    if !coercions.is_empty() {
        doc.insert("coercion".into(), Value::Array(coercions));
    }
    if !validators.is_empty() {
        doc.insert("x-validators".into(), Value::Array(validators));
    }

    if let Some(items) = &spec.items {
        doc.insert("items".into(), Value::Object(spec_document(items, defs)));
    }
    doc
}

fn definition_pointer(name: &str) -> String {
    format!("#/$defs/{}", name.replace('~', "~0").replace('/', "~1"))
}

fn extension_entry(name: &str, phase: &str, params: &Value) -> Value {
    let mut entry = Map::new();
    entry.insert("name".into(), Value::from(name));
    entry.insert("phase".into(), Value::from(phase));
    if !params.is_null() {
        entry.insert("params".into(), params.clone());
    }
    Value::Object(entry)
}
