//! # Compiled Model Descriptors
//!
//! A [`CompiledModel`] is plain data: an ordered list of [`Field`]s, each
//! pointing at a [`ValueSpec`] that says how one value is coerced and checked.
//! One generic routine in [`crate::validate`] interprets it.
//!
//! Models are immutable once built. Extension checks and custom coercions are
//! captured as `Arc`s at compile time, so a model never observes later
//! registry changes. Equality compares structure and names and ignores the
//! captured functions.

use std::fmt;
use std::sync::Arc;

use charter_core::ContentDigest;
use serde_json::Value;

use crate::coercion::Coercion;
use crate::constraint::Constraint;
use crate::error::CoercionError;
use crate::normalize::{NodeKind, Phase};
use crate::registry::{BoundCheck, CustomCoercion};

/// What happens to keys an object does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdditionalProperties {
    /// Dropped from the validated instance.
    #[default]
    Ignore,
    /// Reported as "unexpected field" errors.
    Forbid,
    /// Kept verbatim.
    Allow,
}

/// A compiled record type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
    pub name: String,
    pub description: Option<String>,
    /// Declaration order.
    pub fields: Vec<Field>,
    pub additional: AdditionalProperties,
    /// Fingerprint of the source document. Only the root model carries one.
    pub version: Option<ContentDigest>,
}

impl CompiledModel {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Default of an optional field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldDefault {
    /// No default: an absent optional field stays absent.
    #[default]
    Absent,
    Value(Value),
}

impl FieldDefault {
    /// The default value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Absent => None,
            Self::Value(v) => Some(v),
        }
    }
}

/// One declared property.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub required: bool,
    pub default: FieldDefault,
    pub description: Option<String>,
    pub spec: Arc<ValueSpec>,
}

impl Field {
    /// Coercion names in pipeline order, including implicit format companions.
    pub fn coercions(&self) -> Vec<&str> {
        self.spec
            .pipeline
            .iter()
            .filter_map(|step| match step {
                PipelineStep::Coerce(c) => Some(c.name.as_str()),
                PipelineStep::Check(_) => None,
            })
            .collect()
    }

    /// Keyword constraints in check order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.spec.constraints
    }

    /// Post-phase extension checks in declaration order.
    pub fn post_extensions(&self) -> &[ExtensionCall] {
        &self.spec.post
    }

    /// Nested model of an object-valued field.
    pub fn model(&self) -> Option<&Arc<CompiledModel>> {
        self.spec.model.as_ref()
    }
}

/// How a single value is coerced and checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    /// Never [`NodeKind::Reference`]; references compile to their target.
    pub kind: NodeKind,
    pub nullable: bool,
    /// Coercions and pre-phase checks, in order.
    pub pipeline: Vec<PipelineStep>,
    pub constraints: Vec<Constraint>,
    pub post: Vec<ExtensionCall>,
    /// Object kinds.
    pub model: Option<Arc<CompiledModel>>,
    /// Array kinds; `None` accepts any items.
    pub items: Option<Arc<ValueSpec>>,
}

/// One step of the pre-check pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    Coerce(CoercionStep),
    Check(ExtensionCall),
}

/// A resolved coercion.
#[derive(Clone)]
pub struct CoercionStep {
    /// Name as declared (or the companion's canonical name).
    pub name: String,
    /// Added by a `format` keyword rather than declared.
    pub implicit: bool,
    pub func: CoercionFn,
}

/// The function behind a coercion step.
#[derive(Clone)]
pub enum CoercionFn {
    Builtin(Coercion),
    Custom(CustomCoercion),
}

impl CoercionStep {
    /// Apply the coercion. Only custom coercions can fail.
    pub fn apply(&self, value: Value) -> Result<Value, CoercionError> {
        match &self.func {
            CoercionFn::Builtin(c) => Ok(c.apply(value)),
            CoercionFn::Custom(f) => f(value).map_err(|msg| CoercionError::new(&self.name, msg)),
        }
    }
}

impl PartialEq for CoercionStep {
    fn eq(&self, other: &Self) -> bool {
        let same_fn = match (&self.func, &other.func) {
            (CoercionFn::Builtin(a), CoercionFn::Builtin(b)) => a == b,
            (CoercionFn::Custom(_), CoercionFn::Custom(_)) => true,
            _ => false,
        };
        self.name == other.name && self.implicit == other.implicit && same_fn
    }
}

impl fmt::Debug for CoercionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoercionStep")
            .field("name", &self.name)
            .field("implicit", &self.implicit)
            .field(
                "builtin",
                &matches!(self.func, CoercionFn::Builtin(_)),
            )
            .finish()
    }
}

/// An extension validator with its parameters bound.
#[derive(Clone)]
pub struct ExtensionCall {
    pub name: String,
    pub phase: Phase,
    /// Parameters as declared.
    pub params: Value,
    pub(crate) check: BoundCheck,
}

impl ExtensionCall {
    /// Run the check.
    pub fn run(&self, value: &Value) -> Result<(), String> {
        (self.check)(value)
    }
}

impl PartialEq for ExtensionCall {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.phase == other.phase && self.params == other.params
    }
}

impl fmt::Debug for ExtensionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionCall")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
