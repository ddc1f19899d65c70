// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
mod commands;
mod config;
mod format;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use commands::SchemaKind;
use format::{Formatter, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;
/// Exit code for usage / argument errors (clap's own `exit(2)` covers most of
/// these before `main` ever runs).
#[allow(dead_code)]
const EXIT_USAGE_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "scanopt", version, about = "Scan-orchestration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a set of packages.
    Scan {
        /// Path to a JSON file containing an array of packages.
        packages: PathBuf,

        /// Path to a TOML config file. Defaults to built-in defaults if omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the config's `store_dir`.
        #[arg(long)]
        store_dir: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormatArg::Table)]
        format: OutputFormatArg,
    },

    /// Validate a config file (or the built-in defaults) and print warnings.
    ValidateConfig {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a JSON schema to stdout.
    Schema {
        /// Which schema to print.
        #[arg(value_enum)]
        kind: SchemaArg,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum SchemaArg {
    /// Package schema.
    Package,
    /// ScanOptConfig schema.
    Config,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormatArg {
    Json,
    JsonPretty,
    Table,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(v: OutputFormatArg) -> Self {
        match v {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::JsonPretty => OutputFormat::JsonPretty,
            OutputFormatArg::Table => OutputFormat::Table,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("scanopt=debug")
    } else {
        EnvFilter::new("scanopt=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Scan {
            packages,
            config,
            store_dir,
            format,
        } => cmd_scan(&packages, config.as_deref(), store_dir, format.into()).await,
        Commands::ValidateConfig { config } => cmd_validate_config(config.as_deref()),
        Commands::Schema { kind } => cmd_schema(kind),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn cmd_scan(
    packages_path: &std::path::Path,
    config_path: Option<&std::path::Path>,
    store_dir_override: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let packages = commands::load_packages_file(packages_path)?;

    let mut cfg = scanopt_config::load_config(config_path).context("load config")?;
    if let Some(store_dir) = store_dir_override {
        cfg.store_dir = Some(store_dir);
    }

    for warning in scanopt_config::validate_config(&cfg).context("validate config")? {
        tracing::warn!("{warning}");
    }

    let orchestrator = config::build_orchestrator(&cfg)?;
    let output = orchestrator.scan(packages).await;

    let formatter = Formatter::new(format);
    println!("{}", formatter.format_run(&output));

    Ok(())
}

fn cmd_validate_config(config_path: Option<&std::path::Path>) -> Result<()> {
    let warnings = commands::config_check(config_path)?;
    if warnings.is_empty() {
        println!("valid");
    } else {
        for w in &warnings {
            println!("warning: {w}");
        }
    }
    Ok(())
}

fn cmd_schema(kind: SchemaArg) -> Result<()> {
    let sk = match kind {
        SchemaArg::Package => SchemaKind::Package,
        SchemaArg::Config => SchemaKind::Config,
    };
    println!("{}", commands::schema_json(sk)?);
    Ok(())
}
