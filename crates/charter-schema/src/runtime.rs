//! # Store-Backed Validation
//!
//! The "merge rules from the store, compile once, validate many" path.
//!
//! Compiled models are cached by schema id, resolved version, content
//! fingerprint of the composite document, and requested model name. The
//! fingerprint is part of the key, so a store that rewrites a version in
//! place never serves a stale model. A cached model keeps the registry
//! snapshot it was compiled with; [`ModelCache::clear`] drops it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use charter_core::{fingerprint, ContentDigest};
use parking_lot::RwLock;
use serde_json::Value;

use crate::compile::Compiler;
use crate::error::{CharterError, StoreError, ValidationError};
use crate::model::CompiledModel;
use crate::normalize::normalize;
use crate::registry::Registry;
use crate::store::{CompleteSchema, MetadataStore};
use crate::validate::{validate, validate_batch, Mode, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    schema_id: String,
    version: String,
    fingerprint: ContentDigest,
    model_name: Option<String>,
}

/// Compiled models keyed by schema id and version.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: RwLock<HashMap<CacheKey, Arc<CompiledModel>>>,
}

impl ModelCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache behind the free functions of this module.
    pub fn global() -> &'static ModelCache {
        static GLOBAL: OnceLock<ModelCache> = OnceLock::new();
        GLOBAL.get_or_init(ModelCache::new)
    }

    /// Number of cached models.
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached model.
    pub fn clear(&self) {
        self.models.write().clear();
    }

    fn get_or_compile(
        &self,
        schema: &CompleteSchema,
        model_name: Option<&str>,
        registry: &Arc<Registry>,
    ) -> Result<Arc<CompiledModel>, CharterError> {
        let digest = fingerprint(&schema.document)?;
        let key = CacheKey {
            schema_id: schema.schema_id.clone(),
            version: schema.version.clone(),
            fingerprint: digest.clone(),
            model_name: model_name.map(str::to_string),
        };
        if let Some(model) = self.models.read().get(&key) {
            tracing::debug!(schema_id = %key.schema_id, version = %key.version, "model cache hit");
            return Ok(Arc::clone(model));
        }

        let mut compiler = Compiler::with_registry(Arc::clone(registry));
        if let Some(name) = model_name {
            compiler = compiler.with_name(name);
        }
        let node = normalize(&schema.document)?;
        let model = Arc::new(compiler.compile_node(&node, Some(digest))?);
        tracing::debug!(
            schema_id = %key.schema_id,
            version = %key.version,
            model = %model.name,
            "model cache miss; compiled"
        );
        let mut models = self.models.write();
        // A version rewritten in place leaves its old fingerprint unreachable.
        models.retain(|cached, _| {
            cached.fingerprint == key.fingerprint
                || cached.schema_id != key.schema_id
                || cached.version != key.version
                || cached.model_name != key.model_name
        });
        Ok(Arc::clone(models.entry(key).or_insert(model)))
    }
}

/// Validates data against schemas held in a metadata store.
///
/// Owns its model cache, so validators over different registries never share
/// compiled models.
#[derive(Debug)]
pub struct StoreValidator<S> {
    store: S,
    registry: Arc<Registry>,
    cache: ModelCache,
}

impl<S: MetadataStore> StoreValidator<S> {
    /// A validator over the process-wide registry.
    pub fn new(store: S) -> Self {
        Self::with_registry(store, Registry::global())
    }

    /// A validator over a specific registry.
    pub fn with_registry(store: S, registry: Arc<Registry>) -> Self {
        Self {
            store,
            registry,
            cache: ModelCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Fetch the composite schema and compile it (or reuse the cached model).
    pub fn get_model(
        &self,
        schema_id: &str,
        version: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<Arc<CompiledModel>, CharterError> {
        model_from(&self.store, &self.cache, &self.registry, schema_id, version, model_name)
    }

    /// Validate one instance.
    pub fn validate(
        &self,
        schema_id: &str,
        data: &Value,
        version: Option<&str>,
        mode: Mode,
    ) -> Result<ValidationResult, CharterError> {
        let model = self.get_model(schema_id, version, None)?;
        Ok(validate(&model, data, mode)?)
    }

    /// Validate a batch with one fetch and one compile.
    pub fn validate_batch(
        &self,
        schema_id: &str,
        items: &[Value],
        version: Option<&str>,
        mode: Mode,
    ) -> Result<Vec<Result<ValidationResult, ValidationError>>, CharterError> {
        let model = self.get_model(schema_id, version, None)?;
        Ok(validate_batch(&model, items, mode))
    }
}

/// Validate one instance against a stored schema, using the process-wide
/// registry and model cache.
///
/// A missing schema is [`StoreError::NotFound`]; a strict-mode failure is
/// [`CharterError::Validation`].
pub fn validate_with_store(
    store: &impl MetadataStore,
    schema_id: &str,
    data: &Value,
    version: Option<&str>,
    mode: Mode,
) -> Result<ValidationResult, CharterError> {
    let model = get_model_from_store(store, schema_id, version, None)?;
    Ok(validate(&model, data, mode)?)
}

/// Validate a batch against a stored schema with one fetch and one compile.
pub fn validate_batch_with_store(
    store: &impl MetadataStore,
    schema_id: &str,
    items: &[Value],
    version: Option<&str>,
    mode: Mode,
) -> Result<Vec<Result<ValidationResult, ValidationError>>, CharterError> {
    let model = get_model_from_store(store, schema_id, version, None)?;
    Ok(validate_batch(&model, items, mode))
}

/// Compile a stored schema, optionally naming the root model.
pub fn get_model_from_store(
    store: &impl MetadataStore,
    schema_id: &str,
    version: Option<&str>,
    model_name: Option<&str>,
) -> Result<Arc<CompiledModel>, CharterError> {
    model_from(
        store,
        ModelCache::global(),
        &Registry::global(),
        schema_id,
        version,
        model_name,
    )
}

fn model_from(
    store: &impl MetadataStore,
    cache: &ModelCache,
    registry: &Arc<Registry>,
    schema_id: &str,
    version: Option<&str>,
    model_name: Option<&str>,
) -> Result<Arc<CompiledModel>, CharterError> {
    let schema = store
        .get_complete_schema(schema_id, version)?
        .ok_or_else(|| StoreError::not_found(schema_id, version))?;
    cache.get_or_compile(&schema, model_name, registry)
}
