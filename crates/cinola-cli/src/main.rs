//! Cinola harvest CLI
//!
//! The `cinola` command prepares and harvests Cinola working directories.
//!
//! ## Commands
//!
//! - `collect`: Repair the output tables in a directory and print them as JSON
//! - `table`: Print an already repaired output file as JSON
//! - `stage-input`: Copy the Cinola input files from a template directory

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn, Level};

use cinola_harvest::{copy_input_files, HarvestConfig, ResultAggregator, TableParser};

#[derive(Parser)]
#[command(name = "cinola")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvest Cinola simulation output into tables", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair and parse every B/T output table in a working directory
    Collect {
        /// Working directory holding the Cinola output
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Harvest config file (TOML)
        #[arg(short, long, env = "CINOLA_HARVEST_CONFIG")]
        config: Option<PathBuf>,

        /// Keep a backup of each file before every repair stage
        #[arg(long)]
        keep_backups: bool,

        /// Reject files whose unit line is longer than the header
        #[arg(long)]
        strict_units: bool,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse an already repaired output file and print it as JSON
    Table {
        /// Repaired output file (`name_[unit]` header)
        file: PathBuf,
    },

    /// Copy Cinola input files from a template directory
    StageInput {
        /// Directory holding the template input files
        #[arg(long)]
        from: PathBuf,

        /// Working directory to copy into
        #[arg(long, default_value = ".")]
        to: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cinola_harvest::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Collect {
            dir,
            config,
            keep_backups,
            strict_units,
            output,
        } => cmd_collect(
            &dir,
            config.as_deref(),
            keep_backups,
            strict_units,
            output.as_deref(),
        ),
        Commands::Table { file } => cmd_table(&file),
        Commands::StageInput { from, to } => cmd_stage_input(&from, &to),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_collect(
    dir: &Path,
    config_path: Option<&Path>,
    keep_backups: bool,
    strict_units: bool,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let mut config = match config_path {
        Some(path) => HarvestConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => HarvestConfig::default(),
    };
    // Flags can only switch options on.
    config.keep_backups |= keep_backups;
    config.strict_units |= strict_units;

    let report = ResultAggregator::new(&config)
        .collect(dir)
        .with_context(|| format!("Failed to harvest {}", dir.display()))?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    match output {
        Some(path) => {
            fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in &report.failures {
            warn!(path = %failure.path.display(), kind = %failure.kind, "{}", failure.error);
        }
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_table(file: &Path) -> Result<ExitCode> {
    let table = TableParser::parse_file(file)
        .with_context(|| format!("Failed to read table {}", file.display()))?;
    info!(
        columns = table.column_count(),
        rows = table.row_count(),
        "Parsed table"
    );
    let json = serde_json::to_string_pretty(&table).context("Failed to serialize table")?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn cmd_stage_input(from: &Path, to: &Path) -> Result<ExitCode> {
    let copied = copy_input_files(from, to)
        .with_context(|| format!("Failed to stage input files from {}", from.display()))?;
    for path in &copied {
        println!("{}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}
