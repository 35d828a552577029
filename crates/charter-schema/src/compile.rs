//! # Model Compiler
//!
//! Turns a normalized [`SchemaNode`] into a [`CompiledModel`]:
//!
//! - object nodes become nested models, array nodes become sequence specs
//!   over a compiled item spec, leaves become primitive specs;
//! - a reference compiles once per definition and every use shares the
//!   result;
//! - field order mirrors declaration order;
//! - coercion and extension names are resolved against a [`Registry`] and
//!   captured, so the model is a snapshot of the registry at compile time.
//!
//! ## Naming
//!
//! The root model takes the explicit name, else the schema title, else
//! `DynamicModel`. A nested model takes its title, else the definition name
//! it was reached through, else `<Root>_<Path>` built from the field path.
//! Two structurally different models that want the same name are kept apart
//! by qualifying the later one with its field path; identical ones share a
//! single model.

use std::collections::HashMap;
use std::sync::Arc;

use charter_core::{fingerprint, ContentDigest};
use serde_json::Value;

use crate::coercion::Coercion;
use crate::constraint::{translate, Constraint};
use crate::error::{CharterError, CompilationError, SchemaError};
use crate::model::{
    AdditionalProperties, CoercionFn, CoercionStep, CompiledModel, ExtensionCall, Field,
    FieldDefault, PipelineStep, ValueSpec,
};
use crate::normalize::{normalize, NodeKind, Phase, SchemaNode};
use crate::registry::Registry;

/// Name given to a root model with neither an explicit name nor a title.
pub const DEFAULT_MODEL_NAME: &str = "DynamicModel";

/// Compiles schema documents against a registry.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<Registry>,
    name: Option<String>,
}

impl Compiler {
    /// A compiler over the process-wide registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }

    /// A compiler over a specific registry.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            name: None,
        }
    }

    /// Name the root model explicitly.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The registry this compiler resolves names against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Normalize, fingerprint, and compile a raw schema document.
    pub fn compile(&self, document: &Value) -> Result<CompiledModel, CharterError> {
        let node = normalize(document)?;
        let version = fingerprint(document)?;
        self.compile_node(&node, Some(version))
    }

    /// Compile an already-normalized root node.
    pub fn compile_node(
        &self,
        node: &SchemaNode,
        version: Option<ContentDigest>,
    ) -> Result<CompiledModel, CharterError> {
        if node.kind != NodeKind::Object {
            return Err(SchemaError::Malformed {
                path: "#".into(),
                reason: format!("root schema must be an object, got {}", node.kind),
            }
            .into());
        }
        let name = self
            .name
            .clone()
            .or_else(|| node.title.clone())
            .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());

        let mut session = Session {
            registry: &self.registry,
            root: name.clone(),
            names: HashMap::from([(name.clone(), None)]),
            references: HashMap::new(),
        };
        let (fields, additional) = session.object(node, &Location::root())?;
        let model = CompiledModel {
            name,
            description: node.description.clone(),
            fields,
            additional,
            version,
        };
        tracing::debug!(
            model = %model.name,
            fields = model.fields.len(),
            version = %model.version.as_ref().map(ContentDigest::short).unwrap_or_default(),
            "compiled schema"
        );
        Ok(model)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile `document` with the process-wide registry.
pub fn compile(document: &Value) -> Result<CompiledModel, CharterError> {
    Compiler::new().compile(document)
}

// ---------------------------------------------------------------------------
// Compilation session
// ---------------------------------------------------------------------------

/// Where a node sits: JSON-pointer-style path for errors, field segments for
/// synthetic names.
#[derive(Clone)]
struct Location {
    pointer: String,
    segments: Vec<String>,
}

impl Location {
    fn root() -> Self {
        Self {
            pointer: "#".into(),
            segments: Vec::new(),
        }
    }

    fn property(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self {
            pointer: format!("{}/properties/{name}", self.pointer),
            segments,
        }
    }

    fn items(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.push("item".into());
        Self {
            pointer: format!("{}/items", self.pointer),
            segments,
        }
    }

    fn suffix(&self) -> String {
        self.segments.iter().map(|s| pascal_case(s)).collect::<Vec<_>>().join("_")
    }
}

struct Session<'c> {
    registry: &'c Registry,
    root: String,
    /// Model names handed out so far. The root is reserved with `None`.
    names: HashMap<String, Option<Arc<CompiledModel>>>,
    /// Compiled definitions, keyed by the shared node's address.
    references: HashMap<usize, Arc<ValueSpec>>,
}

impl Session<'_> {
    fn spec(
        &mut self,
        node: &SchemaNode,
        at: &Location,
        definition: Option<&str>,
    ) -> Result<Arc<ValueSpec>, CharterError> {
        if let Some(reference) = &node.reference {
            let key = Arc::as_ptr(&reference.target) as usize;
            let target = match self.references.get(&key) {
                Some(spec) => Arc::clone(spec),
                None => {
                    let spec = self.spec(&reference.target, at, Some(&reference.name))?;
                    self.references.insert(key, Arc::clone(&spec));
                    spec
                }
            };
            return self.layer(node, target, at);
        }

        let constraints = translate(node.kind, &node.constraints, &at.pointer)?;
        let pipeline = self.pipeline(node, &constraints, &at.pointer)?;
        let post = node
            .extensions
            .iter()
            .filter(|e| e.phase == Phase::Post)
            .map(|e| self.extension(&e.name, e.phase, &e.params, &at.pointer))
            .collect::<Result<Vec<_>, _>>()?;

        let mut spec = ValueSpec {
            kind: node.kind,
            nullable: node.nullable,
            pipeline,
            constraints,
            post,
            model: None,
            items: None,
        };
        match node.kind {
            NodeKind::Object => {
                let (fields, additional) = self.object(node, at)?;
                spec.model = Some(self.name_model(node, at, definition, fields, additional));
            }
            NodeKind::Array => {
                if let Some(item) = &node.items {
                    spec.items = Some(self.spec(item, &at.items(), None)?);
                }
            }
            _ => {
                if node.constraints.contains_key("additionalProperties") {
                    return Err(CompilationError::InvalidKeyword {
                        path: at.pointer.clone(),
                        keyword: "additionalProperties".into(),
                        reason: format!("does not apply to {} fields", node.kind),
                    }
                    .into());
                }
            }
        }
        Ok(Arc::new(spec))
    }

    /// Apply the keywords written next to a `$ref` on top of the target's
    /// spec. Site steps run after the target's own.
    fn layer(
        &self,
        site: &SchemaNode,
        target: Arc<ValueSpec>,
        at: &Location,
    ) -> Result<Arc<ValueSpec>, CharterError> {
        if !site.nullable
            && site.constraints.is_empty()
            && site.coercions.is_empty()
            && site.extensions.is_empty()
        {
            return Ok(target);
        }
        if site.constraints.contains_key("additionalProperties") {
            return Err(CompilationError::InvalidKeyword {
                path: at.pointer.clone(),
                keyword: "additionalProperties".into(),
                reason: "cannot be layered on a reference".into(),
            }
            .into());
        }

        let constraints = translate(target.kind, &site.constraints, &at.pointer)?;
        let pipeline = self.pipeline(site, &constraints, &at.pointer)?;
        let post = site
            .extensions
            .iter()
            .filter(|e| e.phase == Phase::Post)
            .map(|e| self.extension(&e.name, e.phase, &e.params, &at.pointer))
            .collect::<Result<Vec<_>, _>>()?;

        let mut spec = ValueSpec::clone(&target);
        spec.nullable |= site.nullable;
        spec.pipeline.extend(pipeline);
        spec.constraints.extend(constraints);
        spec.post.extend(post);
        Ok(Arc::new(spec))
    }

    fn object(
        &mut self,
        node: &SchemaNode,
        at: &Location,
    ) -> Result<(Vec<Field>, AdditionalProperties), CharterError> {
        let additional = match node.constraints.get("additionalProperties") {
            None => AdditionalProperties::Ignore,
            Some(Value::Bool(false)) => AdditionalProperties::Forbid,
            Some(Value::Bool(true)) => AdditionalProperties::Allow,
            Some(Value::Object(schema)) if schema.is_empty() => AdditionalProperties::Allow,
            Some(other) => {
                return Err(CompilationError::InvalidKeyword {
                    path: at.pointer.clone(),
                    keyword: "additionalProperties".into(),
                    reason: format!("expected a boolean, got {other}"),
                }
                .into())
            }
        };

        let mut fields = Vec::with_capacity(node.properties.len());
        for (name, child) in &node.properties {
            let spec = self.spec(child, &at.property(name), None)?;
            let target = child.resolved();
            let default = child
                .default
                .clone()
                .or_else(|| target.default.clone())
                .map_or(FieldDefault::Absent, FieldDefault::Value);
            fields.push(Field {
                name: name.clone(),
                required: node.is_required(name),
                default,
                description: child.description.clone().or_else(|| target.description.clone()),
                spec,
            });
        }
        Ok((fields, additional))
    }

    fn name_model(
        &mut self,
        node: &SchemaNode,
        at: &Location,
        definition: Option<&str>,
        fields: Vec<Field>,
        additional: AdditionalProperties,
    ) -> Arc<CompiledModel> {
        let base = node
            .title
            .clone()
            .or_else(|| definition.map(str::to_string))
            .unwrap_or_else(|| format!("{}_{}", self.root, at.suffix()));
        let candidate = CompiledModel {
            name: base.clone(),
            description: node.description.clone(),
            fields,
            additional,
            version: None,
        };

        let mut name = base.clone();
        let mut attempt = 1;
        loop {
            match self.names.get(&name) {
                None => break,
                Some(Some(existing)) if same_shape(existing, &candidate) => {
                    return Arc::clone(existing);
                }
                Some(_) => {
                    attempt += 1;
                    name = match attempt {
                        2 if !at.segments.is_empty() => format!("{base}_{}", at.suffix()),
                        n => format!("{base}_{}_{n}", at.suffix()),
                    };
                }
            }
        }

        if name != base {
            tracing::debug!(requested = %base, assigned = %name, "qualified colliding model name");
        }
        let model = Arc::new(CompiledModel { name: name.clone(), ..candidate });
        self.names.insert(name, Some(Arc::clone(&model)));
        model
    }

    fn pipeline(
        &self,
        node: &SchemaNode,
        constraints: &[Constraint],
        pointer: &str,
    ) -> Result<Vec<PipelineStep>, CharterError> {
        let mut steps = Vec::new();
        for name in &node.coercions {
            let step = self.coercion(name).ok_or_else(|| CompilationError::UnknownCoercion {
                path: pointer.to_string(),
                name: name.clone(),
            })?;
            steps.push(PipelineStep::Coerce(step));
        }
        for ext in node.extensions.iter().filter(|e| e.phase == Phase::Pre) {
            match self.coercion(&ext.name) {
                Some(step) => steps.push(PipelineStep::Coerce(step)),
                None => steps.push(PipelineStep::Check(self.extension(
                    &ext.name,
                    ext.phase,
                    &ext.params,
                    pointer,
                )?)),
            }
        }
        for constraint in constraints {
            if let Constraint::Format(format) = constraint {
                let companion = format.companion();
                steps.push(PipelineStep::Coerce(CoercionStep {
                    name: companion.name().to_string(),
                    implicit: true,
                    func: CoercionFn::Builtin(companion),
                }));
            }
        }
        Ok(steps)
    }

    fn coercion(&self, name: &str) -> Option<CoercionStep> {
        let func = match Coercion::from_name(name) {
            Some(builtin) => CoercionFn::Builtin(builtin),
            None => CoercionFn::Custom(self.registry.coercion(name)?),
        };
        Some(CoercionStep {
            name: name.to_string(),
            implicit: false,
            func,
        })
    }

    fn extension(
        &self,
        name: &str,
        phase: Phase,
        params: &Value,
        pointer: &str,
    ) -> Result<ExtensionCall, CompilationError> {
        let extension =
            self.registry
                .validator(name)
                .ok_or_else(|| CompilationError::UnknownValidator {
                    path: pointer.to_string(),
                    name: name.to_string(),
                })?;
        let check = extension
            .bind(params)
            .map_err(|reason| CompilationError::InvalidParams {
                path: pointer.to_string(),
                name: name.to_string(),
                reason,
            })?;
        Ok(ExtensionCall {
            name: name.to_string(),
            phase,
            params: params.clone(),
            check,
        })
    }
}

fn same_shape(a: &CompiledModel, b: &CompiledModel) -> bool {
    a.fields == b.fields && a.additional == b.additional && a.description == b.description
}

fn pascal_case(segment: &str) -> String {
    segment
        .split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
