//! # Schema Normalizer
//!
//! Turns a raw schema document into a [`SchemaNode`] tree:
//!
//! - local references (`#/definitions/<name>`, `#/$defs/<name>`) are resolved
//!   against the root's definitions table and expanded in place;
//! - each definition is expanded once and shared by every reference to it;
//! - a reference chain that revisits a definition already on the active
//!   resolution path is rejected as a cycle, with the chain in the error;
//! - every definition is expanded, referenced or not, so a cycle or a bad
//!   keyword anywhere in the definitions table is an error;
//! - constraints, coercions, and extensions written next to a `$ref` are kept
//!   on the reference node and layered onto the target by the compiler;
//! - the `type` keyword is checked, or inferred when absent;
//! - unknown keywords are kept verbatim in [`SchemaNode::unknown`].
//!
//! Keyword *values* are not interpreted here beyond their shape. The
//! compiler decides whether `minLength: "x"` is usable.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Keywords the constraint translator understands.
pub(crate) const CONSTRAINT_KEYWORDS: &[&str] = &[
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
    "additionalProperties",
];

/// Structural kind of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    Null,
    /// A `$ref` to a local definition.
    Reference,
}

impl NodeKind {
    /// Parse a `type` keyword value.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            _ => return None,
        })
    }

    /// The `type` keyword value for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Reference => "$ref",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an extension validator runs relative to coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Interleaved with the coercion pipeline, before keyword constraints.
    Pre,
    /// After coercion and keyword constraints pass.
    #[default]
    Post,
}

/// One declared extension validator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDecl {
    pub name: String,
    pub phase: Phase,
    /// Parameters as written; `Value::Null` when absent.
    pub params: Value,
}

/// A resolved local reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Definition name (last segment of the pointer).
    pub name: String,
    /// The expanded definition, shared by every reference to it.
    pub target: Arc<SchemaNode>,
}

/// One schema or subschema after reference expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    /// `type: [T, "null"]`.
    pub nullable: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Constraint keywords exactly as written.
    pub constraints: Map<String, Value>,
    /// Declaration order.
    pub properties: Vec<(String, Arc<SchemaNode>)>,
    pub items: Option<Arc<SchemaNode>>,
    pub required: Vec<String>,
    pub default: Option<Value>,
    /// Coercion names from the `coercion` keyword, in order.
    pub coercions: Vec<String>,
    /// `x-validators` followed by `validations` entries.
    pub extensions: Vec<ExtensionDecl>,
    pub reference: Option<Reference>,
    /// Keywords this crate does not interpret.
    pub unknown: Map<String, Value>,
}

impl SchemaNode {
    fn empty(kind: NodeKind) -> Self {
        Self {
            kind,
            nullable: false,
            title: None,
            description: None,
            constraints: Map::new(),
            properties: Vec::new(),
            items: None,
            required: Vec::new(),
            default: None,
            coercions: Vec::new(),
            extensions: Vec::new(),
            reference: None,
            unknown: Map::new(),
        }
    }

    /// Follow references to the node that carries the structure.
    pub fn resolved(&self) -> &SchemaNode {
        let mut node = self;
        while let Some(reference) = &node.reference {
            node = &reference.target;
        }
        node
    }

    /// Look up a declared property.
    pub fn property(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    /// Whether `name` is listed in `required`.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// Normalize a raw schema document.
pub fn normalize(document: &Value) -> Result<SchemaNode, SchemaError> {
    let root = document.as_object().ok_or_else(|| SchemaError::Malformed {
        path: "#".into(),
        reason: "schema document must be an object".into(),
    })?;

    let mut definitions = HashMap::new();
    for section in ["definitions", "$defs"] {
        match root.get(section) {
            None => {}
            Some(Value::Object(defs)) => {
                for (name, def) in defs {
                    definitions.insert(format!("{section}/{name}"), def);
                }
            }
            Some(_) => {
                return Err(SchemaError::Malformed {
                    path: format!("#/{section}"),
                    reason: "definitions section must be an object".into(),
                })
            }
        }
    }

    let mut normalizer = Normalizer {
        definitions,
        expanded: HashMap::new(),
        resolving: Vec::new(),
    };
    let mut node = normalizer.node(document, "#")?;

    let mut keys: Vec<String> = normalizer.definitions.keys().cloned().collect();
    keys.sort();
    for key in keys {
        normalizer.expand(&key, &format!("#/{key}"))?;
    }

    node.unknown.remove("definitions");
    node.unknown.remove("$defs");
    Ok(node)
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

struct Normalizer<'a> {
    /// `definitions/<name>` or `$defs/<name>` to the raw definition.
    definitions: HashMap<String, &'a Value>,
    /// Definitions already expanded, by the same key.
    expanded: HashMap<String, Arc<SchemaNode>>,
    /// Active resolution path: (key, name).
    resolving: Vec<(String, String)>,
}

impl<'a> Normalizer<'a> {
    fn node(&mut self, raw: &'a Value, path: &str) -> Result<SchemaNode, SchemaError> {
        let obj = raw.as_object().ok_or_else(|| SchemaError::Malformed {
            path: path.to_string(),
            reason: format!("expected a schema object, got {}", crate::value::type_name(raw)),
        })?;

        if let Some(reference) = obj.get("$ref") {
            return self.reference_node(obj, reference, path);
        }

        let (kind, nullable) = node_kind(obj, path)?;
        let mut node = SchemaNode::empty(kind);
        node.nullable = nullable;

        for (key, value) in obj {
            match key.as_str() {
                "type" => {}
                "title" => node.title = Some(expect_str(value, path, key)?.to_string()),
                "description" => {
                    node.description = Some(expect_str(value, path, key)?.to_string())
                }
                "default" => node.default = Some(value.clone()),
                "properties" => {
                    if kind != NodeKind::Object {
                        return Err(misplaced(path, key, kind));
                    }
                    let props = value.as_object().ok_or_else(|| SchemaError::Malformed {
                        path: path.to_string(),
                        reason: "properties must be an object".into(),
                    })?;
                    for (name, child) in props {
                        let child_path = format!("{path}/properties/{name}");
                        let child = self.node(child, &child_path)?;
                        node.properties.push((name.clone(), Arc::new(child)));
                    }
                }
                "items" => {
                    if kind != NodeKind::Array {
                        return Err(misplaced(path, key, kind));
                    }
                    if value.is_array() {
                        return Err(SchemaError::Malformed {
                            path: path.to_string(),
                            reason: "tuple-form items are not supported".into(),
                        });
                    }
                    let item = self.node(value, &format!("{path}/items"))?;
                    node.items = Some(Arc::new(item));
                }
                "required" => {
                    if kind != NodeKind::Object {
                        return Err(misplaced(path, key, kind));
                    }
                    node.required = string_list(value, path, key)?;
                }
                _ => site_keyword(&mut node, key, value, path)?,
            }
        }
        validations(&mut node, obj, path)?;

        let mut seen = Vec::with_capacity(node.required.len());
        for name in std::mem::take(&mut node.required) {
            if node.property(&name).is_none() {
                return Err(SchemaError::UndeclaredRequired {
                    path: path.to_string(),
                    name,
                });
            }
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        node.required = seen;

        Ok(node)
    }

    fn reference_node(
        &mut self,
        obj: &'a Map<String, Value>,
        reference: &Value,
        path: &str,
    ) -> Result<SchemaNode, SchemaError> {
        let reference = expect_str(reference, path, "$ref")?;
        let (name, target) = self.resolve(reference, path)?;

        let mut node = SchemaNode::empty(NodeKind::Reference);
        for (key, value) in obj {
            match key.as_str() {
                "$ref" => {}
                "type" => {
                    let (kind, nullable) = node_kind(obj, path)?;
                    let expected = target.resolved().kind;
                    if kind != expected {
                        return Err(SchemaError::Malformed {
                            path: path.to_string(),
                            reason: format!(
                                "type {kind} conflicts with the referenced {expected} definition"
                            ),
                        });
                    }
                    node.nullable = nullable;
                }
                "title" => node.title = Some(expect_str(value, path, key)?.to_string()),
                "description" => {
                    node.description = Some(expect_str(value, path, key)?.to_string())
                }
                "default" => node.default = Some(value.clone()),
                "properties" | "items" | "required" => {
                    return Err(misplaced(path, key, NodeKind::Reference))
                }
                _ => site_keyword(&mut node, key, value, path)?,
            }
        }
        validations(&mut node, obj, path)?;
        node.reference = Some(Reference { name, target });
        Ok(node)
    }

    fn resolve(
        &mut self,
        reference: &str,
        path: &str,
    ) -> Result<(String, Arc<SchemaNode>), SchemaError> {
        let Some(pointer) = reference.strip_prefix("#/") else {
            return Err(if reference.starts_with('#') {
                SchemaError::UnresolvedReference {
                    path: path.to_string(),
                    reference: reference.to_string(),
                }
            } else {
                SchemaError::ExternalReference {
                    path: path.to_string(),
                    reference: reference.to_string(),
                }
            });
        };
        let unresolved = || SchemaError::UnresolvedReference {
            path: path.to_string(),
            reference: reference.to_string(),
        };
        let (section, raw_name) = pointer.split_once('/').ok_or_else(unresolved)?;
        if !matches!(section, "definitions" | "$defs") || raw_name.contains('/') {
            return Err(unresolved());
        }
        let name = raw_name.replace("~1", "/").replace("~0", "~");
        let key = format!("{section}/{name}");
        if !self.definitions.contains_key(&key) {
            return Err(unresolved());
        }
        let node = self.expand(&key, path)?;
        Ok((name, node))
    }

    /// Expand the definition stored under `key` (`<section>/<name>`), once.
    fn expand(&mut self, key: &str, path: &str) -> Result<Arc<SchemaNode>, SchemaError> {
        if let Some(node) = self.expanded.get(key) {
            return Ok(Arc::clone(node));
        }
        let name = key.split_once('/').map_or(key, |(_, n)| n).to_string();
        if let Some(start) = self.resolving.iter().position(|(k, _)| k == key) {
            let mut chain: Vec<String> =
                self.resolving[start..].iter().map(|(_, n)| n.clone()).collect();
            chain.push(name);
            return Err(SchemaError::CyclicReference { chain });
        }
        let definition =
            *self
                .definitions
                .get(key)
                .ok_or_else(|| SchemaError::UnresolvedReference {
                    path: path.to_string(),
                    reference: format!("#/{key}"),
                })?;

        self.resolving.push((key.to_string(), name));
        let expanded = self.node(definition, &format!("#/{key}"));
        self.resolving.pop();

        let node = Arc::new(expanded?);
        self.expanded.insert(key.to_string(), Arc::clone(&node));
        Ok(node)
    }
}

// ---------------------------------------------------------------------------
// Keyword shape helpers
// ---------------------------------------------------------------------------

fn node_kind(obj: &Map<String, Value>, path: &str) -> Result<(NodeKind, bool), SchemaError> {
    match obj.get("type") {
        Some(Value::String(name)) => NodeKind::from_type_name(name)
            .map(|kind| (kind, false))
            .ok_or_else(|| SchemaError::UnknownType {
                path: path.to_string(),
                type_name: name.clone(),
            }),
        Some(Value::Array(types)) => {
            let mut names = Vec::with_capacity(types.len());
            for t in types {
                let name = expect_str(t, path, "type")?;
                let kind = NodeKind::from_type_name(name).ok_or_else(|| {
                    SchemaError::UnknownType {
                        path: path.to_string(),
                        type_name: name.to_string(),
                    }
                })?;
                names.push(kind);
            }
            match names.as_slice() {
                [NodeKind::Null] => Ok((NodeKind::Null, false)),
                [kind] => Ok((*kind, false)),
                [NodeKind::Null, kind] | [kind, NodeKind::Null] if *kind != NodeKind::Null => {
                    Ok((*kind, true))
                }
                _ => Err(SchemaError::Malformed {
                    path: path.to_string(),
                    reason: "type unions other than [T, \"null\"] are not supported".into(),
                }),
            }
        }
        Some(other) => Err(SchemaError::Malformed {
            path: path.to_string(),
            reason: format!("type must be a string or list, got {}", crate::value::type_name(other)),
        }),
        None => infer_kind(obj)
            .map(|kind| (kind, false))
            .ok_or_else(|| SchemaError::Malformed {
                path: path.to_string(),
                reason: "missing type and none can be inferred".into(),
            }),
    }
}

fn infer_kind(obj: &Map<String, Value>) -> Option<NodeKind> {
    if obj.contains_key("properties") {
        return Some(NodeKind::Object);
    }
    if obj.contains_key("items") {
        return Some(NodeKind::Array);
    }
    let literals: Vec<&Value> = match (obj.get("enum"), obj.get("const")) {
        (Some(Value::Array(values)), _) => values.iter().collect(),
        (None, Some(value)) => vec![value],
        _ => return None,
    };
    let mut kind = None;
    for literal in literals {
        let this = match crate::value::type_name(literal) {
            "integer" => NodeKind::Integer,
            "number" => NodeKind::Number,
            "string" => NodeKind::String,
            "boolean" => NodeKind::Boolean,
            _ => return None,
        };
        kind = match (kind, this) {
            (None, k) => Some(k),
            (Some(a), b) if a == b => Some(a),
            (Some(NodeKind::Integer), NodeKind::Number)
            | (Some(NodeKind::Number), NodeKind::Integer) => Some(NodeKind::Number),
            _ => return None,
        };
    }
    kind
}

fn x_validators(value: &Value, path: &str) -> Result<Vec<ExtensionDecl>, SchemaError> {
    let malformed = |reason: &str| SchemaError::Malformed {
        path: path.to_string(),
        reason: format!("x-validators: {reason}"),
    };
    match value {
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match entry {
                Value::String(name) => Ok(ExtensionDecl {
                    name: name.clone(),
                    phase: Phase::Post,
                    params: Value::Null,
                }),
                Value::Object(decl) => {
                    let name = decl
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| malformed("entry without a name"))?;
                    let phase = match (decl.get("phase"), decl.get("pre")) {
                        (Some(Value::String(p)), _) if p == "pre" => Phase::Pre,
                        (Some(Value::String(p)), _) if p == "post" => Phase::Post,
                        (Some(other), _) => {
                            return Err(malformed(&format!("unknown phase {other}")))
                        }
                        (None, Some(Value::Bool(true))) => Phase::Pre,
                        (None, _) => Phase::Post,
                    };
                    Ok(ExtensionDecl {
                        name: name.to_string(),
                        phase,
                        params: decl.get("params").cloned().unwrap_or(Value::Null),
                    })
                }
                _ => Err(malformed("entries must be names or objects")),
            })
            .collect(),
        Value::Object(by_name) => Ok(by_name
            .iter()
            .map(|(name, params)| ExtensionDecl {
                name: name.clone(),
                phase: Phase::Post,
                params: params.clone(),
            })
            .collect()),
        _ => Err(malformed("must be a list")),
    }
}

/// Keywords shared by plain nodes and `$ref` sites: coercions, extensions,
/// constraints. Anything else is kept as unknown.
fn site_keyword(
    node: &mut SchemaNode,
    key: &str,
    value: &Value,
    path: &str,
) -> Result<(), SchemaError> {
    match key {
        "coercion" => {
            node.coercions = match value {
                Value::String(name) => vec![name.clone()],
                other => string_list(other, path, key)?,
            };
        }
        "x-validators" => node.extensions.extend(x_validators(value, path)?),
        "validations" => {}
        k if CONSTRAINT_KEYWORDS.contains(&k) => {
            node.constraints.insert(key.to_string(), value.clone());
        }
        _ => {
            node.unknown.insert(key.to_string(), value.clone());
        }
    }
    Ok(())
}

/// Append `validations` entries as post-phase extensions, after `x-validators`.
fn validations(
    node: &mut SchemaNode,
    obj: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaError> {
    let Some(validations) = obj.get("validations") else {
        return Ok(());
    };
    let rules = validations.as_object().ok_or_else(|| SchemaError::Malformed {
        path: path.to_string(),
        reason: "validations must map rule names to parameters".into(),
    })?;
    for (name, params) in rules {
        node.extensions.push(ExtensionDecl {
            name: name.clone(),
            phase: Phase::Post,
            params: params.clone(),
        });
    }
    Ok(())
}

fn expect_str<'v>(value: &'v Value, path: &str, key: &str) -> Result<&'v str, SchemaError> {
    value.as_str().ok_or_else(|| SchemaError::Malformed {
        path: path.to_string(),
        reason: format!("{key} must be a string"),
    })
}

fn string_list(value: &Value, path: &str, key: &str) -> Result<Vec<String>, SchemaError> {
    let bad = || SchemaError::Malformed {
        path: path.to_string(),
        reason: format!("{key} must be a list of strings"),
    };
    value
        .as_array()
        .ok_or_else(bad)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(bad))
        .collect()
}

fn misplaced(path: &str, key: &str, kind: NodeKind) -> SchemaError {
    SchemaError::Malformed {
        path: path.to_string(),
        reason: format!("{key} is not allowed on a {kind} node"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn properties_keep_declaration_order() {
        let node = normalize(&json!({
            "type": "object",
            "properties": {"zeta": {"type": "string"}, "alpha": {"type": "integer"}},
            "required": ["alpha"]
        }))
        .unwrap();
        let names: Vec<_> = node.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(node.is_required("alpha"));
        assert!(!node.is_required("zeta"));
    }

    #[test]
    fn references_share_one_expansion() {
        let node = normalize(&json!({
            "type": "object",
            "definitions": {"Money": {"type": "number", "minimum": 0}},
            "properties": {
                "price": {"$ref": "#/definitions/Money"},
                "cost": {"$ref": "#/definitions/Money"}
            }
        }))
        .unwrap();
        let price = node.property("price").unwrap().reference.as_ref().unwrap();
        let cost = node.property("cost").unwrap().reference.as_ref().unwrap();
        assert_eq!(price.name, "Money");
        assert!(Arc::ptr_eq(&price.target, &cost.target));
        assert_eq!(price.target.kind, NodeKind::Number);
    }

    #[test]
    fn defs_section_resolves() {
        let node = normalize(&json!({
            "type": "object",
            "$defs": {"Tag": {"type": "string"}},
            "properties": {"tag": {"$ref": "#/$defs/Tag"}}
        }))
        .unwrap();
        assert_eq!(node.property("tag").unwrap().resolved().kind, NodeKind::String);
        assert!(node.unknown.is_empty());
    }

    #[test]
    fn cycle_is_rejected_with_chain() {
        let err = normalize(&json!({
            "type": "object",
            "definitions": {
                "A": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}},
                "B": {"type": "object", "properties": {"a": {"$ref": "#/definitions/A"}}}
            },
            "properties": {"root": {"$ref": "#/definitions/A"}}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::CyclicReference {
                chain: vec!["A".into(), "B".into(), "A".into()]
            }
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = normalize(&json!({
            "type": "object",
            "definitions": {"Node": {"type": "array", "items": {"$ref": "#/definitions/Node"}}},
            "properties": {"tree": {"$ref": "#/definitions/Node"}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::CyclicReference { .. }));
    }

    #[test]
    fn unresolved_and_external_references() {
        let missing = normalize(&json!({
            "type": "object",
            "properties": {"x": {"$ref": "#/definitions/Nope"}}
        }))
        .unwrap_err();
        assert!(matches!(missing, SchemaError::UnresolvedReference { .. }));

        let external = normalize(&json!({
            "type": "object",
            "properties": {"x": {"$ref": "https://example.com/schema.json"}}
        }))
        .unwrap_err();
        assert!(matches!(external, SchemaError::ExternalReference { .. }));
    }

    #[test]
    fn unknown_type_rejected() {
        let err = normalize(&json!({"type": "object", "properties": {"x": {"type": "decimal"}}}))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref type_name, .. } if type_name == "decimal"));
    }

    #[test]
    fn nullable_type_list() {
        let node = normalize(&json!({"type": ["string", "null"]})).unwrap();
        assert_eq!(node.kind, NodeKind::String);
        assert!(node.nullable);
        assert!(normalize(&json!({"type": ["string", "integer"]})).is_err());
    }

    #[test]
    fn kind_inferred_when_type_absent() {
        assert_eq!(normalize(&json!({"properties": {}})).unwrap().kind, NodeKind::Object);
        assert_eq!(normalize(&json!({"enum": ["a", "b"]})).unwrap().kind, NodeKind::String);
        assert_eq!(normalize(&json!({"enum": [1, 2.5]})).unwrap().kind, NodeKind::Number);
        assert!(normalize(&json!({"enum": [1, "a"]})).is_err());
    }

    #[test]
    fn unknown_keywords_preserved() {
        let node = normalize(&json!({
            "type": "object",
            "version": "1.0.0",
            "properties": {"a": {"type": "string", "x-ui-widget": "textarea"}}
        }))
        .unwrap();
        assert_eq!(node.unknown.get("version"), Some(&json!("1.0.0")));
        assert_eq!(
            node.property("a").unwrap().unknown.get("x-ui-widget"),
            Some(&json!("textarea"))
        );
    }

    #[test]
    fn required_must_be_declared() {
        let err = normalize(&json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["b"]
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::UndeclaredRequired { ref name, .. } if name == "b"));
    }

    #[test]
    fn extensions_parsed_in_order() {
        let node = normalize(&json!({
            "type": "string",
            "coercion": "to_lowercase",
            "x-validators": [
                {"name": "strip_whitespace", "phase": "pre"},
                {"name": "max_length", "params": {"max_length": 10}},
                "non_empty_string"
            ],
            "validations": {"only_allow": {"allowed_values": ["a"]}}
        }))
        .unwrap();
        assert_eq!(node.coercions, vec!["to_lowercase"]);
        let summary: Vec<_> = node
            .extensions
            .iter()
            .map(|e| (e.name.as_str(), e.phase))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("strip_whitespace", Phase::Pre),
                ("max_length", Phase::Post),
                ("non_empty_string", Phase::Post),
                ("only_allow", Phase::Post),
            ]
        );
    }

    #[test]
    fn properties_on_string_rejected() {
        let err = normalize(&json!({"type": "string", "properties": {}})).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
    }

    #[test]
    fn unreferenced_definitions_are_checked() {
        let cycle = normalize(&json!({
            "type": "object",
            "definitions": {
                "A": {"type": "object", "properties": {"b": {"$ref": "#/definitions/B"}}},
                "B": {"type": "object", "properties": {"a": {"$ref": "#/definitions/A"}}}
            },
            "properties": {"x": {"type": "string"}}
        }))
        .unwrap_err();
        assert_eq!(
            cycle,
            SchemaError::CyclicReference {
                chain: vec!["A".into(), "B".into(), "A".into()]
            }
        );

        let bad_type = normalize(&json!({
            "type": "object",
            "$defs": {"X": {"type": "decimal"}},
            "properties": {}
        }))
        .unwrap_err();
        assert!(matches!(bad_type, SchemaError::UnknownType { ref type_name, .. } if type_name == "decimal"));
    }

    #[test]
    fn reference_site_keywords_are_kept() {
        let node = normalize(&json!({
            "type": "object",
            "definitions": {"Name": {"type": "string"}},
            "properties": {
                "n": {
                    "$ref": "#/definitions/Name",
                    "type": ["string", "null"],
                    "minLength": 5,
                    "coercion": "to_uppercase",
                    "x-validators": [{"name": "no_capital_characters"}],
                    "validations": {"max_length": 10},
                    "x-ui": "wide"
                }
            }
        }))
        .unwrap();
        let site = node.property("n").unwrap();
        assert_eq!(site.kind, NodeKind::Reference);
        assert!(site.nullable);
        assert_eq!(site.constraints.get("minLength"), Some(&json!(5)));
        assert_eq!(site.coercions, vec!["to_uppercase".to_string()]);
        let names: Vec<&str> = site.extensions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["no_capital_characters", "max_length"]);
        assert_eq!(site.unknown.get("x-ui"), Some(&json!("wide")));
    }

    #[test]
    fn reference_site_type_must_match_target() {
        let err = normalize(&json!({
            "type": "object",
            "definitions": {"Name": {"type": "string"}},
            "properties": {"n": {"$ref": "#/definitions/Name", "type": "integer"}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
    }
}
