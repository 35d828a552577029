//! # Validate Subcommand
//!
//! Validates a data file against a schema file. A data file holding a JSON
//! array is validated as a batch, one result per element, unless `--single`
//! is given.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use charter_schema::{load_file, validate_batch, Mode, ValidationResult};
use clap::Args;
use serde_json::Value;

use crate::compile_file;

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema document (JSON or YAML).
    #[arg(long)]
    pub schema: PathBuf,

    /// Data file (JSON or YAML).
    #[arg(long)]
    pub data: PathBuf,

    /// Stop each item at its first failure.
    #[arg(long)]
    pub strict: bool,

    /// Treat a top-level array as one instance rather than a batch.
    #[arg(long)]
    pub single: bool,
}

/// Validation report for the data file.
#[derive(Debug)]
pub struct Report {
    pub results: Vec<ValidationResult>,
    pub batch: bool,
}

impl Report {
    pub fn all_valid(&self) -> bool {
        self.results.iter().all(|r| r.is_valid)
    }

    /// The report as printed: one result, or an array for batches.
    pub fn to_json(&self) -> anyhow::Result<Value> {
        let value = if self.batch {
            serde_json::to_value(&self.results)?
        } else {
            match self.results.first() {
                Some(result) => serde_json::to_value(result)?,
                None => Value::Null,
            }
        };
        Ok(value)
    }
}

/// Compile the schema and validate the data file.
pub fn execute(args: &ValidateArgs) -> anyhow::Result<Report> {
    let model = compile_file(&args.schema, None)?;
    let data = load_file(&args.data)
        .with_context(|| format!("failed to load data {}", args.data.display()))?;

    let (items, batch) = match data {
        Value::Array(items) if !args.single => (items, true),
        other => (vec![other], false),
    };

    let results = validate_batch(&model, &items, Mode::from(args.strict))
        .into_iter()
        .map(|outcome| {
            outcome.unwrap_or_else(|err| ValidationResult {
                is_valid: false,
                data: None,
                errors: vec![err.entry],
            })
        })
        .collect::<Vec<_>>();

    let failed = results.iter().filter(|r| !r.is_valid).count();
    tracing::info!(
        model = %model.name,
        items = results.len(),
        failed,
        strict = args.strict,
        "validation finished"
    );
    Ok(Report { results, batch })
}

/// Print the report; exit code 1 when any item failed.
pub fn run(args: &ValidateArgs) -> anyhow::Result<ExitCode> {
    let report = execute(args)?;
    println!("{}", serde_json::to_string_pretty(&report.to_json()?)?);
    Ok(if report.all_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
