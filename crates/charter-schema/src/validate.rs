//! # Runtime Validation Engine
//!
//! One routine interprets a [`CompiledModel`] against an instance. Per value:
//!
//! 1. run the pipeline (coercions and pre-phase checks, in order);
//! 2. accept `null` for null-kind, nullable, or optional fields;
//! 3. check the JSON type, normalizing whole floats for integer fields;
//! 4. run every keyword constraint, collecting all failures;
//! 5. validate nested records or array items;
//! 6. run post-phase extensions once everything above passed.
//!
//! Failures go to a sink. In lenient mode the sink collects everything and
//! every field is attempted. In strict mode the first push halts the walk and
//! becomes a [`ValidationError`]; it is the same routine with a fail-fast
//! sink, not a separate path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorEntry, ValidationError};
use crate::model::{AdditionalProperties, CompiledModel, FieldDefault, PipelineStep, ValueSpec};
use crate::normalize::NodeKind;
use crate::value::{integral, join_index, join_key, type_name};

/// Error collection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Collect every failure; never raise.
    #[default]
    Lenient,
    /// Raise the first failure.
    Strict,
}

impl From<bool> for Mode {
    fn from(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Outcome of validating one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// The validated and coerced instance, present only when valid.
    pub data: Option<Value>,
    /// Failures in the order they were found.
    pub errors: Vec<ErrorEntry>,
}

impl ValidationResult {
    fn valid(data: Value) -> Self {
        Self {
            is_valid: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    fn invalid(errors: Vec<ErrorEntry>) -> Self {
        Self {
            is_valid: false,
            data: None,
            errors,
        }
    }
}

/// Validate one instance.
///
/// Lenient mode always returns `Ok`. Strict mode returns the first failure
/// as `Err` and stops.
pub fn validate(
    model: &CompiledModel,
    data: &Value,
    mode: Mode,
) -> Result<ValidationResult, ValidationError> {
    let mut sink = Sink {
        mode,
        errors: Vec::new(),
    };
    let outcome = match data {
        Value::Object(input) => validate_object(model, input, "", &mut sink),
        other => sink
            .push(ErrorEntry::new(
                "",
                format!("expected object, got {}", type_name(other)),
                "type",
            ))
            .map(|()| None),
    };
    match outcome {
        Ok(Some(instance)) if sink.errors.is_empty() => {
            Ok(ValidationResult::valid(Value::Object(instance)))
        }
        Ok(_) => Ok(ValidationResult::invalid(sink.errors)),
        Err(Halt(entry)) => Err(ValidationError::from(entry)),
    }
}

/// Validate each instance independently. Order and count are preserved;
/// `mode` applies per item.
pub fn validate_batch(
    model: &CompiledModel,
    items: &[Value],
    mode: Mode,
) -> Vec<Result<ValidationResult, ValidationError>> {
    items.iter().map(|item| validate(model, item, mode)).collect()
}

impl CompiledModel {
    /// Lenient validation.
    pub fn check(&self, data: &Value) -> ValidationResult {
        let mut sink = Sink {
            mode: Mode::Lenient,
            errors: Vec::new(),
        };
        match data {
            Value::Object(input) => match validate_object(self, input, "", &mut sink) {
                Ok(Some(instance)) if sink.errors.is_empty() => {
                    ValidationResult::valid(Value::Object(instance))
                }
                _ => ValidationResult::invalid(sink.errors),
            },
            other => ValidationResult::invalid(vec![ErrorEntry::new(
                "",
                format!("expected object, got {}", type_name(other)),
                "type",
            )]),
        }
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

/// Strict-mode stop signal carrying the failure.
struct Halt(ErrorEntry);

struct Sink {
    mode: Mode,
    errors: Vec<ErrorEntry>,
}

impl Sink {
    fn push(&mut self, entry: ErrorEntry) -> Result<(), Halt> {
        match self.mode {
            Mode::Strict => Err(Halt(entry)),
            Mode::Lenient => {
                self.errors.push(entry);
                Ok(())
            }
        }
    }
}

/// `Ok(None)` means the value failed and its errors are in the sink.
type Step<T> = Result<Option<T>, Halt>;

fn validate_object(
    model: &CompiledModel,
    input: &Map<String, Value>,
    loc: &str,
    sink: &mut Sink,
) -> Step<Map<String, Value>> {
    let mut out = Map::new();
    let mut ok = true;

    for field in &model.fields {
        let field_loc = join_key(loc, &field.name);
        match input.get(&field.name) {
            Some(raw) => match validate_value(&field.spec, raw.clone(), &field_loc, !field.required, sink)? {
                Some(value) => {
                    out.insert(field.name.clone(), value);
                }
                None => ok = false,
            },
            None if field.required => {
                sink.push(ErrorEntry::new(field_loc, "field required", "required"))?;
                ok = false;
            }
            None => {
                if let FieldDefault::Value(default) = &field.default {
                    out.insert(field.name.clone(), default.clone());
                }
            }
        }
    }

    for (key, value) in input {
        if model.field(key).is_some() {
            continue;
        }
        match model.additional {
            AdditionalProperties::Ignore => {}
            AdditionalProperties::Allow => {
                out.insert(key.clone(), value.clone());
            }
            AdditionalProperties::Forbid => {
                sink.push(ErrorEntry::new(
                    join_key(loc, key),
                    "unexpected field",
                    "additionalProperties",
                ))?;
                ok = false;
            }
        }
    }

    Ok(ok.then_some(out))
}

fn validate_value(
    spec: &ValueSpec,
    mut value: Value,
    loc: &str,
    optional: bool,
    sink: &mut Sink,
) -> Step<Value> {
    for step in &spec.pipeline {
        match step {
            PipelineStep::Coerce(coercion) => match coercion.apply(value) {
                Ok(next) => value = next,
                Err(err) => {
                    sink.push(ErrorEntry::new(loc, err.message, err.name))?;
                    return Ok(None);
                }
            },
            PipelineStep::Check(call) => {
                if let Err(msg) = call.run(&value) {
                    sink.push(ErrorEntry::new(loc, msg, call.name.clone()))?;
                    return Ok(None);
                }
            }
        }
    }

    if value.is_null() && (spec.kind == NodeKind::Null || spec.nullable || optional) {
        return Ok(Some(Value::Null));
    }

    let value = match check_type(spec.kind, value) {
        Ok(v) => v,
        Err(got) => {
            sink.push(ErrorEntry::new(
                loc,
                format!("expected {}, got {got}", spec.kind),
                "type",
            ))?;
            return Ok(None);
        }
    };

    let mut ok = true;
    for constraint in &spec.constraints {
        if let Err(msg) = constraint.check(&value) {
            sink.push(ErrorEntry::new(loc, msg, constraint.keyword()))?;
            ok = false;
        }
    }

    let value = match value {
        Value::Object(input) => match &spec.model {
            Some(model) => match validate_object(model, &input, loc, sink)? {
                Some(out) => Value::Object(out),
                None => return Ok(None),
            },
            None => Value::Object(input),
        },
        Value::Array(items) => match &spec.items {
            Some(item_spec) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    match validate_value(item_spec, item, &join_index(loc, i), false, sink)? {
                        Some(v) => out.push(v),
                        None => ok = false,
                    }
                }
                Value::Array(out)
            }
            None => Value::Array(items),
        },
        other => other,
    };

    if !ok {
        return Ok(None);
    }
    for call in &spec.post {
        if let Err(msg) = call.run(&value) {
            sink.push(ErrorEntry::new(loc, msg, call.name.clone()))?;
            ok = false;
        }
    }
    Ok(ok.then_some(value))
}

/// Check the JSON type; on mismatch return the actual type name.
fn check_type(kind: NodeKind, value: Value) -> Result<Value, &'static str> {
    let matches = match (&kind, &value) {
        (NodeKind::Object, Value::Object(_))
        | (NodeKind::Array, Value::Array(_))
        | (NodeKind::String, Value::String(_))
        | (NodeKind::Number, Value::Number(_))
        | (NodeKind::Boolean, Value::Bool(_))
        | (NodeKind::Null, Value::Null) => true,
        (NodeKind::Integer, Value::Number(n)) => {
            return integral(n).map(Value::Number).ok_or("number");
        }
        _ => false,
    };
    if matches {
        Ok(value)
    } else {
        Err(type_name(&value))
    }
}
