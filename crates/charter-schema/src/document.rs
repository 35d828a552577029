//! # Document Loading
//!
//! Parses schema and rule documents from JSON or YAML text into
//! `serde_json::Value`. Both parsers reject an object that declares the same
//! key twice: `serde_json` would otherwise keep the last value silently, so
//! JSON goes through a duplicate-rejecting visitor; `serde_yaml` rejects
//! duplicate mapping keys on its own.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

use crate::error::{CharterError, SchemaError};

/// Text format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON text.
    Json,
    /// YAML text.
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Parse a document in the given format.
pub fn parse(text: &str, format: DocumentFormat) -> Result<Value, SchemaError> {
    match format {
        DocumentFormat::Json => parse_json(text),
        DocumentFormat::Yaml => parse_yaml(text),
    }
}

/// Parse JSON text, rejecting duplicate object keys.
pub fn parse_json(text: &str) -> Result<Value, SchemaError> {
    let mut de = serde_json::Deserializer::from_str(text);
    let parsed = StrictValue::deserialize(&mut de).and_then(|v| de.end().map(|()| v));
    match parsed {
        Ok(StrictValue(value)) => Ok(value),
        Err(e) if e.to_string().starts_with(DUPLICATE_KEY) => {
            Err(SchemaError::DuplicateProperty {
                detail: e.to_string(),
            })
        }
        Err(e) => Err(SchemaError::Parse {
            reason: e.to_string(),
        }),
    }
}

/// Parse YAML text into a JSON value.
pub fn parse_yaml(text: &str) -> Result<Value, SchemaError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
        let reason = e.to_string();
        if reason.contains("duplicate entry") {
            SchemaError::DuplicateProperty { detail: reason }
        } else {
            SchemaError::Parse { reason }
        }
    })?;
    yaml_to_json_value(&yaml).map_err(|reason| SchemaError::Parse { reason })
}

/// Read and parse a `.json`, `.yaml`, or `.yml` file.
pub fn load_file(path: impl AsRef<Path>) -> Result<Value, CharterError> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path).ok_or_else(|| SchemaError::Parse {
        reason: format!(
            "unsupported document extension for {}; expected .json, .yaml, or .yml",
            path.display()
        ),
    })?;
    let text = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), ?format, "loading document");
    Ok(parse(&text, format)?)
}

// ---------------------------------------------------------------------------
// Duplicate-rejecting JSON visitor
// ---------------------------------------------------------------------------

const DUPLICATE_KEY: &str = "duplicate key";

struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StrictVisitor).map(StrictValue)
    }
}

struct StrictVisitor;

impl<'de> Visitor<'de> for StrictVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom(format!("cannot represent float {v} in JSON")))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        StrictValue::deserialize(deserializer).map(|v| v.0)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(StrictValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format!("{DUPLICATE_KEY} '{key}'")));
            }
            let StrictValue(value) = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}

// ---------------------------------------------------------------------------
// YAML conversion
// ---------------------------------------------------------------------------

fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key: {other:?}")),
                };
                map.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}
