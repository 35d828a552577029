//! # charter-cli — Charter Command-Line Interface
//!
//! A thin clap front end over `charter-schema`.
//!
//! ## Subcommands
//!
//! - `validate` — Validate one instance or a batch against a schema file
//! - `convert` — Compile a schema file and write the reverse-converted document
//! - `inspect` — Print a compiled model's fields, pipelines, and constraints
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the handlers.
//! - Handlers delegate to `charter-schema`; no schema logic lives here.
//! - Results go to stdout as JSON; diagnostics go through `tracing`.

pub mod convert;
pub mod inspect;
pub mod validate;

use std::path::Path;

use anyhow::Context;
use charter_schema::{load_file, Compiler, CompiledModel};

/// Load and compile a schema file, optionally overriding the root model name.
pub(crate) fn compile_file(path: &Path, name: Option<&str>) -> anyhow::Result<CompiledModel> {
    let document =
        load_file(path).with_context(|| format!("failed to load schema {}", path.display()))?;
    let mut compiler = Compiler::new();
    if let Some(name) = name {
        compiler = compiler.with_name(name);
    }
    let model = compiler
        .compile(&document)
        .with_context(|| format!("failed to compile schema {}", path.display()))?;
    tracing::debug!(path = %path.display(), model = %model.name, "schema compiled");
    Ok(model)
}
