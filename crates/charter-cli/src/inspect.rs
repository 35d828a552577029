//! # Inspect Subcommand
//!
//! Prints a JSON description of the model compiled from a schema file:
//! fields in declaration order with their kinds, pipelines, constraints,
//! and nested model names.

use std::path::PathBuf;
use std::process::ExitCode;

use charter_schema::model::PipelineStep;
use charter_schema::{AdditionalProperties, CompiledModel, Field, ValueSpec};
use clap::Args;
use serde_json::{json, Map, Value};

use crate::compile_file;

/// Arguments for the inspect subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Schema document (JSON or YAML).
    #[arg(long)]
    pub schema: PathBuf,

    /// Root model name, overriding the schema title.
    #[arg(long)]
    pub name: Option<String>,
}

/// Compile the schema and describe the model.
pub fn execute(args: &InspectArgs) -> anyhow::Result<Value> {
    let model = compile_file(&args.schema, args.name.as_deref())?;
    Ok(describe_model(&model))
}

pub fn run(args: &InspectArgs) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&execute(args)?)?);
    Ok(ExitCode::SUCCESS)
}

fn describe_model(model: &CompiledModel) -> Value {
    let additional = match model.additional {
        AdditionalProperties::Ignore => "ignore",
        AdditionalProperties::Forbid => "forbid",
        AdditionalProperties::Allow => "allow",
    };
    json!({
        "name": model.name,
        "version": model.version.as_ref().map(ToString::to_string),
        "additional_properties": additional,
        "fields": model.fields.iter().map(describe_field).collect::<Vec<_>>(),
    })
}

fn describe_field(field: &Field) -> Value {
    let mut out = Map::new();
    out.insert("name".into(), json!(field.name));
    out.insert("required".into(), json!(field.required));
    if let Some(default) = field.default.value() {
        out.insert("default".into(), default.clone());
    }
    describe_spec(&field.spec, &mut out);
    Value::Object(out)
}

fn describe_spec(spec: &ValueSpec, out: &mut Map<String, Value>) {
    out.insert("kind".into(), json!(spec.kind.as_str()));
    out.insert("nullable".into(), json!(spec.nullable));

    let pipeline = spec
        .pipeline
        .iter()
        .map(|step| match step {
            PipelineStep::Coerce(c) if c.implicit => json!({"coerce": c.name, "implicit": true}),
            PipelineStep::Coerce(c) => json!({"coerce": c.name}),
            PipelineStep::Check(call) => json!({"check": call.name, "params": call.params}),
        })
        .collect::<Vec<_>>();
    if !pipeline.is_empty() {
        out.insert("pipeline".into(), Value::Array(pipeline));
    }

    if !spec.constraints.is_empty() {
        let constraints = spec
            .constraints
            .iter()
            .map(|c| (c.keyword().to_string(), c.to_keyword_value()))
            .collect::<Map<_, _>>();
        out.insert("constraints".into(), Value::Object(constraints));
    }

    if !spec.post.is_empty() {
        let post = spec
            .post
            .iter()
            .map(|call| json!({"name": call.name, "params": call.params}))
            .collect::<Vec<_>>();
        out.insert("validators".into(), Value::Array(post));
    }

    if let Some(model) = &spec.model {
        out.insert("model".into(), describe_model(model));
    }
    if let Some(items) = &spec.items {
        let mut item = Map::new();
        describe_spec(items, &mut item);
        out.insert("items".into(), Value::Object(item));
    }
}
