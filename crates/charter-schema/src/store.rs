//! # Metadata Store Contract
//!
//! The engine needs one thing from a metadata store: given a schema id and an
//! optional version, the composite schema document, i.e. the base schema with
//! the externally stored coercion and validation rules merged in.
//! [`MetadataStore`] states that contract as versioned get/set of the three
//! documents; [`MetadataStore::get_complete_schema`] performs the merge.
//!
//! Persistent backends live outside this crate. [`InMemoryMetadataStore`]
//! implements the contract for tests and for hosts that do not need
//! durability.
//!
//! ## Rule documents
//!
//! - coercion rules: `{ "<field path>": "<name>" | ["<name>", ...] }`
//! - validation rules: `{ "<field path>": { "<rule>": <params>, ... } }`
//!
//! Field paths are dotted (`address.city`) and step through array items
//! implicitly. Either document may be wrapped as `{"rules": {...},
//! "version": ...}`. Store-supplied rules replace same-named entries already
//! in the schema.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{CharterError, SchemaError, StoreError};
use crate::normalize::CONSTRAINT_KEYWORDS;

/// A composite schema as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteSchema {
    pub schema_id: String,
    /// The version that was resolved (the latest one when none was asked for).
    pub version: String,
    pub document: Value,
}

/// Versioned storage of schemas and their rule documents.
pub trait MetadataStore: Send + Sync {
    /// Most recently stored version of `schema_id`.
    fn latest_version(&self, schema_id: &str) -> Result<Option<String>, StoreError>;

    fn get_schema(&self, schema_id: &str, version: &str) -> Result<Option<Value>, StoreError>;

    fn store_schema(&self, schema_id: &str, version: &str, schema: Value) -> Result<(), StoreError>;

    fn get_coercion_rules(&self, schema_id: &str, version: &str)
        -> Result<Option<Value>, StoreError>;

    fn store_coercion_rules(
        &self,
        schema_id: &str,
        version: &str,
        rules: Value,
    ) -> Result<(), StoreError>;

    fn get_validation_rules(
        &self,
        schema_id: &str,
        version: &str,
    ) -> Result<Option<Value>, StoreError>;

    fn store_validation_rules(
        &self,
        schema_id: &str,
        version: &str,
        rules: Value,
    ) -> Result<(), StoreError>;

    /// Base schema with coercion and validation rules merged in.
    ///
    /// `Ok(None)` when the schema or the requested version does not exist.
    fn get_complete_schema(
        &self,
        schema_id: &str,
        version: Option<&str>,
    ) -> Result<Option<CompleteSchema>, CharterError> {
        let version = match version {
            Some(v) => v.to_string(),
            None => match self.latest_version(schema_id)? {
                Some(v) => v,
                None => return Ok(None),
            },
        };
        let Some(schema) = self.get_schema(schema_id, &version)? else {
            return Ok(None);
        };
        let coercion_rules = self.get_coercion_rules(schema_id, &version)?;
        let validation_rules = self.get_validation_rules(schema_id, &version)?;
        let document = merge_rules(&schema, coercion_rules.as_ref(), validation_rules.as_ref())?;
        Ok(Some(CompleteSchema {
            schema_id: schema_id.to_string(),
            version,
            document,
        }))
    }
}

// ---------------------------------------------------------------------------
// Rule merge
// ---------------------------------------------------------------------------

/// Merge coercion and validation rule documents into a copy of `base`.
pub fn merge_rules(
    base: &Value,
    coercion_rules: Option<&Value>,
    validation_rules: Option<&Value>,
) -> Result<Value, SchemaError> {
    let mut document = base.clone();
    let definitions = definitions_of(base);

    if let Some(rules) = coercion_rules {
        for (field, names) in rule_entries(rules, "coercion rules")? {
            let names = match names {
                Value::String(_) => names.clone(),
                Value::Array(list) if list.iter().all(Value::is_string) => names.clone(),
                _ => {
                    return Err(SchemaError::Malformed {
                        path: format!("coercion rules/{field}"),
                        reason: "expected a coercion name or list of names".into(),
                    })
                }
            };
            let node = target(&mut document, field, &definitions)?;
            node.insert("coercion".into(), names);
        }
    }

    if let Some(rules) = validation_rules {
        for (field, entries) in rule_entries(rules, "validation rules")? {
            let entries = entries.as_object().ok_or_else(|| SchemaError::Malformed {
                path: format!("validation rules/{field}"),
                reason: "expected a mapping of rule name to parameters".into(),
            })?;
            let node = target(&mut document, field, &definitions)?;
            for (rule, params) in entries {
                if CONSTRAINT_KEYWORDS.contains(&rule.as_str()) {
                    node.insert(rule.clone(), params.clone());
                    continue;
                }
                remove_x_validator(node, rule);
                let validations = node
                    .entry("validations")
                    .or_insert_with(|| Value::Object(Map::new()));
                if !validations.is_object() {
                    *validations = Value::Object(Map::new());
                }
                if let Value::Object(map) = validations {
                    map.insert(rule.clone(), params.clone());
                }
            }
        }
    }

    Ok(document)
}

fn rule_entries<'r>(rules: &'r Value, what: &str) -> Result<&'r Map<String, Value>, SchemaError> {
    let map = rules.as_object().ok_or_else(|| SchemaError::Malformed {
        path: what.to_string(),
        reason: "rule document must be an object".into(),
    })?;
    let wrapped = matches!(map.get("rules"), Some(Value::Object(_)))
        && map
            .keys()
            .all(|k| matches!(k.as_str(), "rules" | "version" | "schema_id" | "title" | "description"));
    match map.get("rules") {
        Some(Value::Object(inner)) if wrapped => Ok(inner),
        _ => Ok(map),
    }
}

fn definitions_of(base: &Value) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for section in ["definitions", "$defs"] {
        if let Some(Value::Object(defs)) = base.get(section) {
            for (name, def) in defs {
                out.insert(format!("#/{section}/{name}"), def.clone());
            }
        }
    }
    out
}

/// Locate the property node for a dotted field path, inlining references on
/// the way so the rule lands on a real node.
fn target<'v>(
    document: &'v mut Value,
    field: &str,
    definitions: &HashMap<String, Value>,
) -> Result<&'v mut Map<String, Value>, SchemaError> {
    let missing = || SchemaError::UnknownRuleTarget {
        field: field.to_string(),
    };
    let mut node = document;
    for segment in field.split('.') {
        inline_reference(node, definitions, field)?;
        if node.get("properties").is_none() && node.get("items").is_some() {
            node = node.get_mut("items").ok_or_else(missing)?;
            inline_reference(node, definitions, field)?;
        }
        node = node
            .get_mut("properties")
            .and_then(|props| props.get_mut(segment))
            .ok_or_else(missing)?;
    }
    inline_reference(node, definitions, field)?;
    node.as_object_mut().ok_or_else(missing)
}

fn inline_reference(
    node: &mut Value,
    definitions: &HashMap<String, Value>,
    field: &str,
) -> Result<(), SchemaError> {
    for _ in 0..=definitions.len() {
        let Some(obj) = node.as_object() else {
            return Ok(());
        };
        let Some(reference) = obj.get("$ref").and_then(Value::as_str) else {
            return Ok(());
        };
        let Some(definition) = definitions.get(reference) else {
            return Err(SchemaError::UnresolvedReference {
                path: format!("rules/{field}"),
                reference: reference.to_string(),
            });
        };
        let mut expanded = match definition {
            Value::Object(def) => def.clone(),
            _ => return Ok(()),
        };
        for (key, value) in obj {
            if key != "$ref" {
                expanded.insert(key.clone(), value.clone());
            }
        }
        *node = Value::Object(expanded);
    }
    Err(SchemaError::Malformed {
        path: format!("rules/{field}"),
        reason: "reference chain does not terminate".into(),
    })
}

fn remove_x_validator(node: &mut Map<String, Value>, name: &str) {
    match node.get_mut("x-validators") {
        Some(Value::Array(entries)) => entries.retain(|entry| match entry {
            Value::String(n) => n != name,
            Value::Object(decl) => decl.get("name").and_then(Value::as_str) != Some(name),
            _ => true,
        }),
        Some(Value::Object(by_name)) => {
            by_name.remove(name);
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SchemaEntry {
    /// Schema versions in insertion order; the last is the latest.
    versions: Vec<String>,
    schemas: HashMap<String, Value>,
    coercion_rules: HashMap<String, Value>,
    validation_rules: HashMap<String, Value>,
}

/// Thread-safe, cloneable in-memory metadata store.
///
/// Clones share the same data. No durability and no queries beyond the
/// contract.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    data: Arc<RwLock<HashMap<String, SchemaEntry>>>,
}

impl InMemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored schema ids, sorted.
    pub fn schema_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.data.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stored versions of `schema_id`, oldest first.
    pub fn versions(&self, schema_id: &str) -> Vec<String> {
        self.data
            .read()
            .get(schema_id)
            .map(|e| e.versions.clone())
            .unwrap_or_default()
    }

    fn read<T>(&self, schema_id: &str, f: impl FnOnce(&SchemaEntry) -> Option<T>) -> Option<T> {
        self.data.read().get(schema_id).and_then(f)
    }

    fn write(&self, schema_id: &str, f: impl FnOnce(&mut SchemaEntry)) {
        let mut guard = self.data.write();
        f(guard.entry(schema_id.to_string()).or_default());
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn latest_version(&self, schema_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(schema_id, |e| e.versions.last().cloned()))
    }

    fn get_schema(&self, schema_id: &str, version: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read(schema_id, |e| e.schemas.get(version).cloned()))
    }

    fn store_schema(&self, schema_id: &str, version: &str, schema: Value) -> Result<(), StoreError> {
        self.write(schema_id, |e| {
            if e.schemas.insert(version.to_string(), schema).is_none() {
                e.versions.push(version.to_string());
            }
        });
        tracing::debug!(schema_id, version, "stored schema");
        Ok(())
    }

    fn get_coercion_rules(
        &self,
        schema_id: &str,
        version: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.read(schema_id, |e| e.coercion_rules.get(version).cloned()))
    }

    fn store_coercion_rules(
        &self,
        schema_id: &str,
        version: &str,
        rules: Value,
    ) -> Result<(), StoreError> {
        self.write(schema_id, |e| {
            e.coercion_rules.insert(version.to_string(), rules);
        });
        Ok(())
    }

    fn get_validation_rules(
        &self,
        schema_id: &str,
        version: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.read(schema_id, |e| e.validation_rules.get(version).cloned()))
    }

    fn store_validation_rules(
        &self,
        schema_id: &str,
        version: &str,
        rules: Value,
    ) -> Result<(), StoreError> {
        self.write(schema_id, |e| {
            e.validation_rules.insert(version.to_string(), rules);
        });
        Ok(())
    }
}
