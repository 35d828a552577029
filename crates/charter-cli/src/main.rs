//! # charter CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use std::process::ExitCode;

use clap::Parser;

/// Charter — compile data-contract schemas and validate data against them.
#[derive(Parser, Debug)]
#[command(name = "charter", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate data files against a schema.
    Validate(charter_cli::validate::ValidateArgs),
    /// Compile a schema and write it back out as a schema document.
    Convert(charter_cli::convert::ConvertArgs),
    /// Describe the model compiled from a schema.
    Inspect(charter_cli::inspect::InspectArgs),
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate(args) => charter_cli::validate::run(&args),
        Commands::Convert(args) => charter_cli::convert::run(&args),
        Commands::Inspect(args) => charter_cli::inspect::run(&args),
    }
}
