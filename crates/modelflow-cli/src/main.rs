//! Modelflow CLI
//!
//! The `modelflow` command checks model documents on disk.
//!
//! ## Commands
//!
//! - `check-environment`: Validate a model environment and list every problem
//! - `inspect-definition`: Check a model definition's header fields
//! - `print-environment`: Re-encode a valid environment as pretty JSON

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modelflow_core::{inspect_definition, DefinitionSummary, ModelEnvironment};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "modelflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check versioned model definitions and environments", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "MODELFLOW_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a model environment document
    CheckEnvironment {
        /// Path to the environment document (JSON)
        path: PathBuf,
    },

    /// Check a model definition document without resolving its phase types
    InspectDefinition {
        /// Path to the definition document (JSON)
        path: PathBuf,
    },

    /// Print a valid model environment as pretty JSON
    PrintEnvironment {
        /// Path to the environment document (JSON)
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    modelflow_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::CheckEnvironment { path } => cmd_check_environment(&path),
        Commands::InspectDefinition { path } => cmd_inspect_definition(&path),
        Commands::PrintEnvironment { path } => cmd_print_environment(&path),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_check_environment(path: &Path) -> Result<()> {
    let env = load_environment(path)?;
    println!("{}", describe_environment(&env));
    Ok(())
}

fn cmd_inspect_definition(path: &Path) -> Result<()> {
    let summary = load_definition_summary(path)?;
    println!("{}", describe_definition(&summary));
    Ok(())
}

fn cmd_print_environment(path: &Path) -> Result<()> {
    let env = load_environment(path)?;
    let pretty = env
        .to_json_pretty()
        .context("Failed to encode model environment")?;
    println!("{}", pretty);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_document(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "reading document");
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Load and validate an environment. The error chain carries every problem found.
fn load_environment(path: &Path) -> Result<ModelEnvironment> {
    let json = read_document(path)?;
    ModelEnvironment::from_json(&json)
        .with_context(|| format!("{} is not a valid model environment", path.display()))
}

fn load_definition_summary(path: &Path) -> Result<DefinitionSummary> {
    let json = read_document(path)?;
    inspect_definition(&json)
        .with_context(|| format!("{} is not a valid model definition", path.display()))
}

fn describe_environment(env: &ModelEnvironment) -> String {
    let mut lines = vec![format!(
        "Model environment {} {} ({}): ok",
        env.name(),
        env.version(),
        env.protocol_version()
    )];
    lines.push(format!("  table:   {}", env.model_table_uri()));

    match env.extract_environment() {
        Some(extract) => lines.push(format!(
            "  extract: {} column(s), {} kv store(s), {} field binding(s)",
            extract.data_request.columns.len(),
            extract.kv_stores.len(),
            extract.field_bindings.len()
        )),
        None => lines.push("  extract: not configured".to_string()),
    }
    match env.score_environment() {
        Some(score) => lines.push(format!(
            "  score:   output {}, {} kv store(s)",
            score.output_column_name,
            score.kv_stores.len()
        )),
        None => lines.push("  score:   not configured".to_string()),
    }
    lines.join("\n")
}

fn describe_definition(summary: &DefinitionSummary) -> String {
    [
        format!(
            "Model definition {} {} ({}): ok",
            summary.name, summary.version, summary.protocol_version
        ),
        format!("  extractor: {}", summary.extractor_class),
        format!("  scorer:    {}", summary.scorer_class),
    ]
    .join("\n")
}
