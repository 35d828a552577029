//! # Constraint Translator
//!
//! Maps schema keywords to typed [`Constraint`] checks. Translation happens
//! once, at compile time, and rejects any keyword whose value cannot be used
//! (`minLength: "x"`, an invalid regex, an unknown format, a draft-4 boolean
//! exclusive bound). Checking is then infallible apart from the verdict.
//!
//! Semantics follow JSON Schema:
//!
//! - lengths count Unicode code points, not bytes;
//! - `pattern` is an unanchored search;
//! - `exclusiveMinimum`/`exclusiveMaximum` are numeric bounds (draft 6+);
//! - `enum`, `const` and `uniqueItems` compare numbers by value, so `1`
//!   and `1.0` are equal.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::coercion::Coercion;
use crate::error::CompilationError;
use crate::normalize::NodeKind;
use crate::value::{compare_numbers, integral, values_equal};

/// A string format with a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Uuid,
    Email,
    Date,
    DateTime,
}

impl Format {
    /// Parse a `format` keyword value.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "uuid" => Self::Uuid,
            "email" => Self::Email,
            "date" => Self::Date,
            "date-time" => Self::DateTime,
            _ => return None,
        })
    }

    /// The `format` keyword value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Email => "email",
            Self::Date => "date",
            Self::DateTime => "date-time",
        }
    }

    /// Coercion run implicitly before the format check.
    pub fn companion(&self) -> Coercion {
        match self {
            Self::Uuid => Coercion::ToUuid,
            Self::Email => Coercion::StripWhitespace,
            Self::Date => Coercion::ToDate,
            Self::DateTime => Coercion::ToDatetime,
        }
    }

    fn accepts(&self, text: &str) -> bool {
        match self {
            Self::Uuid => uuid::Uuid::parse_str(text).is_ok(),
            Self::Email => is_email(text),
            Self::Date => text.len() == 10 && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
            Self::DateTime => {
                DateTime::parse_from_rfc3339(text).is_ok()
                    || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
            }
        }
    }
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    let well_formed = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
    well_formed(local)
        && well_formed(domain)
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// A compiled regular expression with its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source`.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Unanchored search.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// One keyword constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Enum(Vec<Value>),
    Const(Value),
    Format(Format),
    MinLength(u64),
    MaxLength(u64),
    Pattern(Pattern),
    Minimum(Number),
    ExclusiveMinimum(Number),
    Maximum(Number),
    ExclusiveMaximum(Number),
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
}

impl Constraint {
    /// The keyword this constraint was translated from.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Enum(_) => "enum",
            Self::Const(_) => "const",
            Self::Format(_) => "format",
            Self::MinLength(_) => "minLength",
            Self::MaxLength(_) => "maxLength",
            Self::Pattern(_) => "pattern",
            Self::Minimum(_) => "minimum",
            Self::ExclusiveMinimum(_) => "exclusiveMinimum",
            Self::Maximum(_) => "maximum",
            Self::ExclusiveMaximum(_) => "exclusiveMaximum",
            Self::MinItems(_) => "minItems",
            Self::MaxItems(_) => "maxItems",
            Self::UniqueItems => "uniqueItems",
        }
    }

    /// The keyword value in schema form.
    pub fn to_keyword_value(&self) -> Value {
        match self {
            Self::Enum(values) => Value::Array(values.clone()),
            Self::Const(value) => value.clone(),
            Self::Format(format) => Value::from(format.as_str()),
            Self::MinLength(n) | Self::MaxLength(n) | Self::MinItems(n) | Self::MaxItems(n) => {
                Value::from(*n)
            }
            Self::Pattern(p) => Value::from(p.as_str()),
            Self::Minimum(n)
            | Self::ExclusiveMinimum(n)
            | Self::Maximum(n)
            | Self::ExclusiveMaximum(n) => Value::Number(n.clone()),
            Self::UniqueItems => Value::Bool(true),
        }
    }

    /// Check `value`. Values of a kind the constraint does not govern pass.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Self::Enum(allowed), v) => {
                if allowed.iter().any(|a| values_equal(a, v)) {
                    Ok(())
                } else {
                    Err(format!("value must be one of {}", Value::Array(allowed.clone())))
                }
            }
            (Self::Const(expected), v) => {
                if values_equal(expected, v) {
                    Ok(())
                } else {
                    Err(format!("value must equal {expected}"))
                }
            }
            (Self::Format(format), Value::String(s)) => {
                if format.accepts(s) {
                    Ok(())
                } else {
                    Err(format!("'{s}' is not a valid {}", format.as_str()))
                }
            }
            (Self::MinLength(n), Value::String(s)) => {
                let len = s.chars().count() as u64;
                if len >= *n {
                    Ok(())
                } else {
                    Err(format!("string should have at least {n} characters, got {len}"))
                }
            }
            (Self::MaxLength(n), Value::String(s)) => {
                let len = s.chars().count() as u64;
                if len <= *n {
                    Ok(())
                } else {
                    Err(format!("string should have at most {n} characters, got {len}"))
                }
            }
            (Self::Pattern(p), Value::String(s)) => {
                if p.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("string does not match pattern '{}'", p.as_str()))
                }
            }
            (Self::Minimum(bound), Value::Number(n)) => {
                bound_check(n, bound, |o| o != Ordering::Less, "greater than or equal to")
            }
            (Self::ExclusiveMinimum(bound), Value::Number(n)) => {
                bound_check(n, bound, |o| o == Ordering::Greater, "greater than")
            }
            (Self::Maximum(bound), Value::Number(n)) => {
                bound_check(n, bound, |o| o != Ordering::Greater, "less than or equal to")
            }
            (Self::ExclusiveMaximum(bound), Value::Number(n)) => {
                bound_check(n, bound, |o| o == Ordering::Less, "less than")
            }
            (Self::MinItems(n), Value::Array(items)) => {
                if items.len() as u64 >= *n {
                    Ok(())
                } else {
                    Err(format!("array should have at least {n} items, got {}", items.len()))
                }
            }
            (Self::MaxItems(n), Value::Array(items)) => {
                if items.len() as u64 <= *n {
                    Ok(())
                } else {
                    Err(format!("array should have at most {n} items, got {}", items.len()))
                }
            }
            (Self::UniqueItems, Value::Array(items)) => {
                for (i, a) in items.iter().enumerate() {
                    if let Some(j) = items[i + 1..].iter().position(|b| values_equal(a, b)) {
                        return Err(format!(
                            "array items must be unique; items {i} and {} are equal",
                            i + 1 + j
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.keyword(), self.to_keyword_value())
    }
}

fn bound_check(
    n: &Number,
    bound: &Number,
    ok: impl Fn(Ordering) -> bool,
    relation: &str,
) -> Result<(), String> {
    match compare_numbers(n, bound) {
        Some(o) if ok(o) => Ok(()),
        _ => Err(format!("value must be {relation} {bound}, got {n}")),
    }
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate the constraint keywords of one node, in a fixed keyword order.
///
/// `additionalProperties` is an object policy, not a value check, and is
/// handled by the compiler.
pub fn translate(
    kind: NodeKind,
    keywords: &Map<String, Value>,
    path: &str,
) -> Result<Vec<Constraint>, CompilationError> {
    let mut out = Vec::new();
    for keyword in [
        "enum",
        "const",
        "format",
        "minLength",
        "maxLength",
        "pattern",
        "minimum",
        "exclusiveMinimum",
        "maximum",
        "exclusiveMaximum",
        "minItems",
        "maxItems",
        "uniqueItems",
    ] {
        let Some(value) = keywords.get(keyword) else {
            continue;
        };
        if !applies(keyword, kind) {
            return Err(invalid(path, keyword, format!("does not apply to {kind} fields")));
        }
        if let Some(constraint) = translate_one(keyword, value, path)? {
            out.push(constraint);
        }
    }
    Ok(out)
}

fn applies(keyword: &str, kind: NodeKind) -> bool {
    match keyword {
        "enum" | "const" => true,
        "format" | "minLength" | "maxLength" | "pattern" => kind == NodeKind::String,
        "minimum" | "exclusiveMinimum" | "maximum" | "exclusiveMaximum" => {
            matches!(kind, NodeKind::Integer | NodeKind::Number)
        }
        "minItems" | "maxItems" | "uniqueItems" => kind == NodeKind::Array,
        _ => false,
    }
}

fn translate_one(
    keyword: &str,
    value: &Value,
    path: &str,
) -> Result<Option<Constraint>, CompilationError> {
    let constraint = match keyword {
        "enum" => match value {
            Value::Array(values) if !values.is_empty() => Constraint::Enum(values.clone()),
            _ => return Err(invalid(path, keyword, "must be a non-empty list".into())),
        },
        "const" => Constraint::Const(value.clone()),
        "format" => {
            let name = value
                .as_str()
                .ok_or_else(|| invalid(path, keyword, "must be a string".into()))?;
            let format = Format::from_name(name).ok_or_else(|| {
                CompilationError::UnsupportedFormat {
                    path: path.to_string(),
                    format: name.to_string(),
                }
            })?;
            Constraint::Format(format)
        }
        "minLength" => Constraint::MinLength(count(keyword, value, path)?),
        "maxLength" => Constraint::MaxLength(count(keyword, value, path)?),
        "minItems" => Constraint::MinItems(count(keyword, value, path)?),
        "maxItems" => Constraint::MaxItems(count(keyword, value, path)?),
        "pattern" => {
            let source = value
                .as_str()
                .ok_or_else(|| invalid(path, keyword, "must be a string".into()))?;
            let pattern = Pattern::new(source).map_err(|e| CompilationError::InvalidPattern {
                path: path.to_string(),
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;
            Constraint::Pattern(pattern)
        }
        "minimum" => Constraint::Minimum(bound(keyword, value, path)?),
        "maximum" => Constraint::Maximum(bound(keyword, value, path)?),
        "exclusiveMinimum" => Constraint::ExclusiveMinimum(bound(keyword, value, path)?),
        "exclusiveMaximum" => Constraint::ExclusiveMaximum(bound(keyword, value, path)?),
        "uniqueItems" => match value {
            Value::Bool(true) => Constraint::UniqueItems,
            Value::Bool(false) => return Ok(None),
            _ => return Err(invalid(path, keyword, "must be a boolean".into())),
        },
        _ => return Ok(None),
    };
    Ok(Some(constraint))
}

fn count(keyword: &str, value: &Value, path: &str) -> Result<u64, CompilationError> {
    value
        .as_number()
        .and_then(integral)
        .and_then(|n| n.as_u64())
        .ok_or_else(|| invalid(path, keyword, format!("must be a non-negative integer, got {value}")))
}

fn bound(keyword: &str, value: &Value, path: &str) -> Result<Number, CompilationError> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        Value::Bool(_) if keyword.starts_with("exclusive") => {
            Err(CompilationError::BooleanExclusivity {
                path: path.to_string(),
                keyword: keyword.to_string(),
            })
        }
        other => Err(invalid(path, keyword, format!("must be a number, got {other}"))),
    }
}

fn invalid(path: &str, keyword: &str, reason: String) -> CompilationError {
    CompilationError::InvalidKeyword {
        path: path.to_string(),
        keyword: keyword.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(kind: NodeKind, schema: Value) -> Result<Constraint, CompilationError> {
        let map = schema.as_object().cloned().unwrap();
        translate(kind, &map, "#").map(|mut v| v.remove(0))
    }

    #[test]
    fn min_length_counts_code_points() {
        let c = one(NodeKind::String, json!({"minLength": 3})).unwrap();
        assert!(c.check(&json!("héé")).is_ok());
        assert!(c.check(&json!("ab")).is_err());
    }

    #[test]
    fn pattern_is_unanchored() {
        let c = one(NodeKind::String, json!({"pattern": "[0-9]+"})).unwrap();
        assert!(c.check(&json!("abc123def")).is_ok());
        assert!(c.check(&json!("abc")).is_err());
    }

    #[test]
    fn exclusive_bounds_are_strict() {
        let c = one(NodeKind::Number, json!({"exclusiveMinimum": 0})).unwrap();
        assert!(c.check(&json!(0)).is_err());
        assert!(c.check(&json!(0.0)).is_err());
        assert!(c.check(&json!(0.001)).is_ok());
        let c = one(NodeKind::Integer, json!({"maximum": 10})).unwrap();
        assert!(c.check(&json!(10)).is_ok());
        assert!(c.check(&json!(11)).is_err());
    }

    #[test]
    fn boolean_exclusivity_rejected() {
        let err = one(NodeKind::Number, json!({"minimum": 0, "exclusiveMinimum": true})).unwrap_err();
        assert!(matches!(err, CompilationError::BooleanExclusivity { .. }));
    }

    #[test]
    fn enum_is_order_insensitive_with_numeric_equality() {
        let c = one(NodeKind::Number, json!({"enum": [3, 1, 2]})).unwrap();
        assert!(c.check(&json!(1.0)).is_ok());
        assert!(c.check(&json!(4)).is_err());
    }

    #[test]
    fn unique_items_compares_elementwise() {
        let c = one(NodeKind::Array, json!({"uniqueItems": true})).unwrap();
        assert!(c.check(&json!([1, 2, 3])).is_ok());
        assert!(c.check(&json!([{"a": 1}, {"a": 1.0}])).is_err());
        let none = translate(NodeKind::Array, json!({"uniqueItems": false}).as_object().unwrap(), "#").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn unusable_values_rejected() {
        assert!(matches!(
            one(NodeKind::String, json!({"minLength": "x"})),
            Err(CompilationError::InvalidKeyword { .. })
        ));
        assert!(matches!(
            one(NodeKind::String, json!({"pattern": "(unclosed"})),
            Err(CompilationError::InvalidPattern { .. })
        ));
        assert!(matches!(
            one(NodeKind::String, json!({"format": "hostname"})),
            Err(CompilationError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            one(NodeKind::Integer, json!({"minLength": 1})),
            Err(CompilationError::InvalidKeyword { .. })
        ));
    }

    #[test]
    fn formats() {
        let email = one(NodeKind::String, json!({"format": "email"})).unwrap();
        assert!(email.check(&json!("ada@example.com")).is_ok());
        assert!(email.check(&json!("ada@localhost")).is_err());
        assert!(email.check(&json!("not an email")).is_err());

        let date = one(NodeKind::String, json!({"format": "date"})).unwrap();
        assert!(date.check(&json!("2024-02-29")).is_ok());
        assert!(date.check(&json!("2023-02-29")).is_err());

        let dt = one(NodeKind::String, json!({"format": "date-time"})).unwrap();
        assert!(dt.check(&json!("2024-01-15T10:30:00+00:00")).is_ok());
        assert!(dt.check(&json!("yesterday")).is_err());

        let id = one(NodeKind::String, json!({"format": "uuid"})).unwrap();
        assert!(id.check(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8")).is_ok());
        assert!(id.check(&json!("67e55044")).is_err());
    }

    #[test]
    fn fixed_keyword_order() {
        let map = json!({"maxLength": 5, "pattern": "a", "minLength": 1});
        let cs = translate(NodeKind::String, map.as_object().unwrap(), "#").unwrap();
        let keywords: Vec<_> = cs.iter().map(Constraint::keyword).collect();
        assert_eq!(keywords, vec!["minLength", "maxLength", "pattern"]);
    }

    #[test]
    fn keyword_value_round_trips() {
        let map = json!({"minimum": 1.5, "exclusiveMaximum": 10});
        let cs = translate(NodeKind::Number, map.as_object().unwrap(), "#").unwrap();
        assert_eq!(cs[0].to_keyword_value(), json!(1.5));
        assert_eq!(cs[1].to_keyword_value(), json!(10));
    }
}
