//! Sakura CLI - command-line host for the workflow runtime.
//!
//! The CLI wires the runtime to the terminal: it registers the built-in
//! `special/print` blossom, detects the terminal width for output separator
//! lines, and maps `--set`/`--values` arguments onto the root tree's
//! declared parameters.

mod error;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use error::CliError;
use sakura::blossom::Blossom;
use sakura::config::RuntimeConfig;
use sakura::item::BlossomItem;
use sakura::logging;
use sakura::report::DEFAULT_SEPARATOR_WIDTH;
use sakura::runtime::SakuraRuntime;
use sakura::value::{Value, ValueMap};

// ============================================================================
// CLI Argument Definitions
// ============================================================================

#[derive(Parser)]
#[command(name = "sakura")]
#[command(version = sakura::VERSION)]
#[command(about = "Run Sakura workflow scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, validate and execute a script file or directory
    Run {
        /// Script file, or directory containing root.sakura
        path: String,

        /// Initial value override, as key=value (repeatable)
        #[arg(long)]
        set: Vec<String>,

        /// JSON file with initial values (top-level object)
        #[arg(long)]
        values: Option<String>,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Validate only, execute nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse and validate without executing (same as run --dry-run)
    Check {
        /// Script file, or directory containing root.sakura
        path: String,

        /// Initial value override, as key=value (repeatable)
        #[arg(long)]
        set: Vec<String>,

        /// JSON file with initial values (top-level object)
        #[arg(long)]
        values: Option<String>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            path,
            set,
            values,
            workers,
            dry_run,
        } => run(&path, &set, values.as_deref(), workers, dry_run),
        Commands::Check { path, set, values } => run(&path, &set, values.as_deref(), None, true),
    };

    if let Err(e) = result {
        e.exit();
    }
}

fn run(
    path: &str,
    set: &[String],
    values_file: Option<&str>,
    workers: Option<usize>,
    dry_run: bool,
) -> Result<(), CliError> {
    let _guard = logging::init_logging(logging::default_log_dir(), logging::default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    tracing::info!(path, dry_run, "starting sakura run");

    let mut config = RuntimeConfig::default().with_separator_width(terminal_width());
    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }

    let runtime = SakuraRuntime::new(config);
    runtime.add_blossom("special", "print", Arc::new(PrintBlossom));

    let initial_values = build_initial_values(set, values_file)?;
    runtime.process_files(Path::new(path), &initial_values, dry_run)?;

    if dry_run {
        println!("Validation finished without errors.");
    }
    Ok(())
}

/// Terminal width for the separator line, falling back to the default.
fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(width, _)| width as usize)
        .unwrap_or(DEFAULT_SEPARATOR_WIDTH)
}

// ============================================================================
// Initial Values
// ============================================================================

/// Builds the initial value map from `--values` and `--set` arguments.
///
/// `--set` entries are applied last and override file entries.
fn build_initial_values(
    set: &[String],
    values_file: Option<&str>,
) -> Result<ValueMap, CliError> {
    let mut values = ValueMap::new();

    if let Some(path) = values_file {
        let text = fs::read_to_string(path)
            .map_err(|e| CliError::Values(format!("failed to read {}: {}", path, e)))?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| CliError::Values(format!("failed to parse {}: {}", path, e)))?;
        let serde_json::Value::Object(entries) = json else {
            return Err(CliError::Values(format!(
                "{} must contain a top-level JSON object",
                path
            )));
        };
        for (key, entry) in entries {
            values.insert(key, json_to_value(entry));
        }
    }

    for pair in set {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(CliError::Values(format!(
                "\"{}\" is not of the form key=value",
                pair
            )));
        };
        values.insert(key.trim().to_string(), parse_set_value(raw.trim()));
    }

    Ok(values)
}

/// Interprets a `--set` value: null, bool or number when it looks like one,
/// a plain string otherwise.
fn parse_set_value(raw: &str) -> Value {
    match raw {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::Float(float);
    }
    Value::String(raw.to_string())
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Bool(v),
        serde_json::Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                Value::Int(int)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(key, entry)| (key, json_to_value(entry)))
                .collect(),
        ),
    }
}

// ============================================================================
// Built-in Blossoms
// ============================================================================

/// The `special/print` blossom: echoes its "text" value as output.
struct PrintBlossom;

impl Blossom for PrintBlossom {
    fn validate_input(&self, item: &BlossomItem) -> Result<(), String> {
        if item.values.contains_key("text") {
            Ok(())
        } else {
            Err("missing value \"text\"".to_string())
        }
    }

    fn execute(&self, item: &mut BlossomItem, _env: &ValueMap) -> Result<(), String> {
        item.output = item.values.get("text").cloned().unwrap_or(Value::Null);
        Ok(())
    }
}
