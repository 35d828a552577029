//! # charter-schema — Schema Compiler & Runtime Validation Engine
//!
//! Compiles data-contract schema documents into reusable model descriptors,
//! validates JSON instances against them, and converts descriptors back into
//! schema documents.
//!
//! ## Pipeline
//!
//! ```text
//! document ─► normalize ─► SchemaNode ─► Compiler ─► CompiledModel ─► validate ─► ValidationResult
//!                                           │                 │
//!                                       Registry           reverse::to_document
//! ```
//!
//! - [`document`] — JSON/YAML loading with duplicate-key rejection.
//! - [`normalize`] — local `$ref` expansion, cycle detection, type checks.
//! - [`constraint`] — keyword → typed check translation.
//! - [`coercion`] — the built-in value transforms.
//! - [`registry`] — named extension validators and custom coercions.
//! - [`compile`] — [`SchemaNode`] → [`CompiledModel`].
//! - [`validate`] — the lenient/strict engine.
//! - [`reverse`] — [`CompiledModel`] → schema document.
//! - [`store`] / [`runtime`] — metadata store contract, rule merge, and
//!   cached store-backed validation.
//!
//! ## Crate Policy
//!
//! - Depends only on `charter-core` internally.
//! - No `unwrap()`/`expect()` outside tests. Compile-time problems are
//!   `SchemaError`/`CompilationError`; lenient validation failures are data.
//! - The registry is the only process-wide mutable state. Compiled models
//!   hold snapshots and never observe later registrations.
//! - The library logs through `tracing` and never installs a subscriber.

pub mod coercion;
pub mod compile;
pub mod constraint;
pub mod document;
pub mod error;
pub mod model;
pub mod normalize;
pub mod registry;
pub mod reverse;
pub mod runtime;
pub mod store;
pub mod validate;

mod value;

pub use coercion::Coercion;
pub use compile::{compile, Compiler, DEFAULT_MODEL_NAME};
pub use constraint::{Constraint, Format};
pub use document::{load_file, parse_json, parse_yaml, DocumentFormat};
pub use error::{
    CharterError, CoercionError, CompilationError, ErrorEntry, SchemaError, StoreError,
    ValidationError,
};
pub use model::{AdditionalProperties, CompiledModel, Field, FieldDefault, ValueSpec};
pub use normalize::{normalize, NodeKind, Phase, SchemaNode};
pub use registry::{BoundCheck, Extension, Registry};
pub use reverse::{to_document, to_file, to_json};
pub use runtime::{
    get_model_from_store, validate_batch_with_store, validate_with_store, ModelCache,
    StoreValidator,
};
pub use store::{merge_rules, CompleteSchema, InMemoryMetadataStore, MetadataStore};
pub use validate::{validate, validate_batch, Mode, ValidationResult};
