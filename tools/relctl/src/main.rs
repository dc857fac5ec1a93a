//! relctl - command line driver for the related-values engine
//!
//! Validates metadata documents, runs value files through the summarizer
//! and splitter transforms, and decodes single protocol values.

mod context;
mod run;
mod split;
mod validate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

use crate::run::RunOptions;

#[derive(Parser)]
#[command(name = "relctl")]
#[command(about = "Related-values engine driver")]
#[command(long_about = "Related-values engine driver

Commands:
  validate    Set up the engine and report active and excluded points
  run         Process a CSV value file and print the computed updates
  split       Decode one multi-value point with its Modbus or CIP plan

Value files are CSV with columns point,stamp,value where stamp is RFC 3339
or raw ticks and value is JSON.

Examples:
  relctl validate -m points.yaml
  relctl run -m points.yaml -i values.csv --history history.csv
  relctl split -m points.yaml -p Block -v '[10, 20, 30]'")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (YAML); RELVAL_* environment variables override it
    #[arg(short = 's', long, global = true, env = "RELVAL_SETTINGS")]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the engine and report active and excluded points
    Validate {
        /// Metadata document (YAML or JSON)
        #[arg(short, long)]
        metadata: PathBuf,

        /// Only list point names
        #[arg(short, long)]
        brief: bool,
    },

    /// Process a CSV value file and print the computed updates
    Run {
        /// Metadata document (YAML or JSON)
        #[arg(short, long)]
        metadata: PathBuf,

        /// Values to process, in file order
        #[arg(short, long)]
        input: PathBuf,

        /// Values loaded into the store before processing
        #[arg(long)]
        history: Option<PathBuf>,

        /// Write the updates to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Notices per processing call (overrides processor.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Print updates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode one multi-value point with its Modbus or CIP plan
    Split {
        /// Metadata document (YAML or JSON)
        #[arg(short, long)]
        metadata: PathBuf,

        /// Source point name
        #[arg(short, long)]
        point: String,

        /// Source value as JSON, e.g. '[10, 20, 30]'
        #[arg(short, long)]
        value: String,

        /// Stamp of the value (RFC 3339 or raw ticks); now by default
        #[arg(long)]
        stamp: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut settings = context::load_settings(cli.settings.as_deref())?;
    if cli.verbose {
        settings.logging.level = "debug".to_string();
    }
    let log_guard = common::init_logging(&settings.logging)?;

    match cli.command {
        Commands::Validate { metadata, brief } => {
            println!(
                "{} {}",
                "Validating metadata:".bright_cyan(),
                metadata.display().to_string().bright_yellow()
            );
            if !validate::handle_validate(&metadata, &settings, brief)? {
                drop(log_guard);
                std::process::exit(1);
            }
        },
        Commands::Run {
            metadata,
            input,
            history,
            output,
            batch_size,
            json,
        } => {
            run::handle_run(
                RunOptions {
                    metadata: &metadata,
                    input: &input,
                    history: history.as_deref(),
                    output: output.as_deref(),
                    batch_size,
                    json,
                },
                &settings,
            )?;
        },
        Commands::Split {
            metadata,
            point,
            value,
            stamp,
        } => {
            split::handle_split(&metadata, &settings, &point, &value, stamp.as_deref())?;
        },
    }

    drop(log_guard);
    Ok(())
}
