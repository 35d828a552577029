//! # Error Types — Structured Error Hierarchy
//!
//! One `thiserror` enum per failure family, wrapped by [`CharterError`]:
//!
//! - [`SchemaError`] — the document itself is malformed. Fatal at compile time.
//! - [`CompilationError`] — a keyword value or extension name cannot be
//!   resolved. Fatal at compile time; there is no partial model.
//! - [`CoercionError`] — a host-registered coercion failed. Built-in
//!   coercions are total and never produce one.
//! - [`ValidationError`] — the first failure of a strict-mode validation.
//!   Non-strict failures are data in a `ValidationResult`, never errors.
//! - [`StoreError`] — the metadata store collaborator failed, or the
//!   requested schema/version does not exist. The two are distinguishable.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for Charter operations.
#[derive(Error, Debug)]
pub enum CharterError {
    /// The schema document is malformed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A keyword or extension could not be compiled.
    #[error("compilation error: {0}")]
    Compilation(#[from] CompilationError),

    /// Strict-mode validation failure.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Metadata store failure or missing schema.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The schema document could not be fingerprinted.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] charter_core::CanonicalizationError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The schema document is malformed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The document text could not be parsed.
    #[error("cannot parse schema document: {reason}")]
    Parse {
        /// Parser message.
        reason: String,
    },

    /// An object declares the same key twice.
    #[error("duplicate property name: {detail}")]
    DuplicateProperty {
        /// Parser message naming the key and its position.
        detail: String,
    },

    /// `type` names something outside the supported kinds.
    #[error("unknown type '{type_name}' at {path}")]
    UnknownType {
        /// Location of the node in the document.
        path: String,
        /// The offending type keyword.
        type_name: String,
    },

    /// A reference chain revisits a name already on the resolution path.
    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicReference {
        /// Definition names on the active path, ending with the revisited one.
        chain: Vec<String>,
    },

    /// A reference names no local definition.
    #[error("unresolved reference '{reference}' at {path}")]
    UnresolvedReference {
        /// Location of the referencing node.
        path: String,
        /// The `$ref` value.
        reference: String,
    },

    /// A reference points outside the document.
    #[error("external reference '{reference}' at {path}: only #/definitions/<name> and #/$defs/<name> are resolved")]
    ExternalReference {
        /// Location of the referencing node.
        path: String,
        /// The `$ref` value.
        reference: String,
    },

    /// `required` lists a name that is not a declared property.
    #[error("required property '{name}' is not declared in properties at {path}")]
    UndeclaredRequired {
        /// Location of the object node.
        path: String,
        /// The undeclared name.
        name: String,
    },

    /// A rule document targets a field the schema does not have.
    #[error("rule targets unknown field '{field}'")]
    UnknownRuleTarget {
        /// Dotted field path from the rule document.
        field: String,
    },

    /// Structural problem with a node.
    #[error("malformed schema at {path}: {reason}")]
    Malformed {
        /// Location of the node in the document.
        path: String,
        /// What is wrong.
        reason: String,
    },
}

/// A keyword or extension name cannot be resolved at compile time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilationError {
    /// A known keyword carries a value the translator cannot use.
    #[error("invalid '{keyword}' at {path}: {reason}")]
    InvalidKeyword {
        /// Location of the node in the document.
        path: String,
        /// The keyword.
        keyword: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// `format` names a format with no translation.
    #[error("unsupported format '{format}' at {path}")]
    UnsupportedFormat {
        /// Location of the node in the document.
        path: String,
        /// The format name.
        format: String,
    },

    /// `pattern` is not a valid regular expression.
    #[error("invalid pattern '{pattern}' at {path}: {reason}")]
    InvalidPattern {
        /// Location of the node in the document.
        path: String,
        /// The pattern source.
        pattern: String,
        /// Regex compiler message.
        reason: String,
    },

    /// Draft-4 boolean `exclusiveMinimum`/`exclusiveMaximum`.
    #[error("boolean '{keyword}' at {path} uses the draft-4 convention; give the bound as a number instead")]
    BooleanExclusivity {
        /// Location of the node in the document.
        path: String,
        /// The keyword.
        keyword: String,
    },

    /// A coercion name is neither built in nor registered.
    #[error("unknown coercion '{name}' at {path}")]
    UnknownCoercion {
        /// Location of the node in the document.
        path: String,
        /// The coercion name.
        name: String,
    },

    /// An extension validator name is not registered.
    #[error("unknown validator '{name}' at {path}")]
    UnknownValidator {
        /// Location of the node in the document.
        path: String,
        /// The validator name.
        name: String,
    },

    /// An extension validator rejected its parameters.
    #[error("invalid parameters for validator '{name}' at {path}: {reason}")]
    InvalidParams {
        /// Location of the node in the document.
        path: String,
        /// The validator name.
        name: String,
        /// What is wrong with the parameters.
        reason: String,
    },
}

/// A host-registered coercion failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("coercion '{name}' failed: {message}")]
pub struct CoercionError {
    /// The coercion name.
    pub name: String,
    /// Failure description.
    pub message: String,
}

impl CoercionError {
    /// Build a coercion error.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// One validation failure: where, what, and which rule raised it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Dotted field path (`address.city`, `items[2].sku`); empty for the root.
    pub loc: String,
    /// Human-readable description.
    pub msg: String,
    /// Name of the originating rule (`type`, `required`, `minLength`, an
    /// extension or coercion name, ...).
    pub rule: String,
}

impl ErrorEntry {
    /// Build an error entry.
    pub fn new(loc: impl Into<String>, msg: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            msg: msg.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.loc.is_empty() {
            write!(f, "(root): {} [{}]", self.msg, self.rule)
        } else {
            write!(f, "{}: {} [{}]", self.loc, self.msg, self.rule)
        }
    }
}

/// Strict-mode validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed at {entry}")]
pub struct ValidationError {
    /// The failure that stopped validation.
    pub entry: ErrorEntry,
}

impl ValidationError {
    /// Field path of the failure.
    pub fn loc(&self) -> &str {
        &self.entry.loc
    }

    /// Failure description.
    pub fn msg(&self) -> &str {
        &self.entry.msg
    }

    /// Originating rule name.
    pub fn rule(&self) -> &str {
        &self.entry.rule
    }
}

impl From<ErrorEntry> for ValidationError {
    fn from(entry: ErrorEntry) -> Self {
        Self { entry }
    }
}

/// Metadata store failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No schema exists for the identifier/version.
    #[error("schema not found: {schema_id}{}", version.as_deref().map(|v| format!(" (version {v})")).unwrap_or_default())]
    NotFound {
        /// Requested schema identifier.
        schema_id: String,
        /// Requested version, if one was given.
        version: Option<String>,
    },

    /// The collaborator itself failed; the source is carried unmodified.
    #[error("metadata store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Build a not-found error.
    pub fn not_found(schema_id: impl Into<String>, version: Option<&str>) -> Self {
        Self::NotFound {
            schema_id: schema_id.into(),
            version: version.map(str::to_string),
        }
    }

    /// Wrap a collaborator failure.
    pub fn backend(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(source))
    }

    /// True for the user-visible not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_entry_display() {
        let entry = ErrorEntry::new("name", "string is shorter than 3 characters", "minLength");
        assert_eq!(
            entry.to_string(),
            "name: string is shorter than 3 characters [minLength]"
        );
    }

    #[test]
    fn test_error_entry_display_root() {
        let entry = ErrorEntry::new("", "expected object, got array", "type");
        assert!(entry.to_string().starts_with("(root)"));
    }

    #[test]
    fn test_validation_error_accessors() {
        let err = ValidationError::from(ErrorEntry::new("age", "must be positive", "is_positive"));
        assert_eq!(err.loc(), "age");
        assert_eq!(err.rule(), "is_positive");
        assert!(err.to_string().contains("age: must be positive"));
    }

    #[test]
    fn test_cyclic_reference_display() {
        let err = SchemaError::CyclicReference {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "cyclic reference: A -> B -> A");
    }

    #[test]
    fn test_store_not_found_distinguishable() {
        let missing = StoreError::not_found("user", Some("1.0.0"));
        assert!(missing.is_not_found());
        assert_eq!(missing.to_string(), "schema not found: user (version 1.0.0)");

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let backend = StoreError::backend(io);
        assert!(!backend.is_not_found());
        let source = std::error::Error::source(&backend).expect("source preserved");
        assert_eq!(source.to_string(), "timed out");
    }

    #[test]
    fn test_charter_error_from_schema_error() {
        let err: CharterError = SchemaError::UnknownType {
            path: "#/properties/x".into(),
            type_name: "decimal".into(),
        }
        .into();
        assert!(matches!(err, CharterError::Schema(SchemaError::UnknownType { .. })));
    }
}
