//! # Convert Subcommand
//!
//! Compiles a schema file and writes the document reconstructed from the
//! compiled model. Useful for normalizing hand-written schemas.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;

use crate::compile_file;

/// Arguments for the convert subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Schema document (JSON or YAML).
    #[arg(long)]
    pub schema: PathBuf,

    /// Output path. Prints to stdout when omitted.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Indentation width; 0 writes compact JSON.
    #[arg(long, default_value_t = 2)]
    pub indent: usize,

    /// Root model name, overriding the schema title.
    #[arg(long)]
    pub name: Option<String>,
}

fn indent(args: &ConvertArgs) -> Option<usize> {
    (args.indent > 0).then_some(args.indent)
}

/// Compile and reverse-convert, returning the JSON text.
pub fn execute(args: &ConvertArgs) -> anyhow::Result<String> {
    let model = compile_file(&args.schema, args.name.as_deref())?;
    Ok(charter_schema::to_json(&model, indent(args))?)
}

pub fn run(args: &ConvertArgs) -> anyhow::Result<ExitCode> {
    match &args.output {
        Some(path) => {
            let model = compile_file(&args.schema, args.name.as_deref())?;
            charter_schema::to_file(&model, path, indent(args))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(model = %model.name, output = %path.display(), "schema written");
        }
        None => println!("{}", execute(args)?),
    }
    Ok(ExitCode::SUCCESS)
}
