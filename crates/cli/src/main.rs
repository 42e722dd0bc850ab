//! sfctl - SafeFlow engine tooling
//!
//! Validates engine descriptions and replays scripted events through the
//! engine step, printing every output event the engine produces.

mod commands;
mod error;
mod output;
mod script;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::RunArgs;
use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "sfctl")]
#[command(about = "SafeFlow CLI - Validate engine descriptions and replay event scripts")]
#[command(version)]
#[command(long_about = "
sfctl drives the SafeFlow signal engine from the command line.
It validates JSON/YAML engine descriptions and replays JSON Lines event
scripts through the engine step at a fixed cadence.

Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate an engine description
    Validate {
        /// Description file (.json, .yaml or .yml)
        description: PathBuf,
    },

    /// Replay an event script through the engine
    Run(RunArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("sfctl={log_level},safeflow_config={log_level},safeflow_engine={log_level}")
                    .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let exit_code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            if cli.json {
                output::print_error_json(&e, exit_code);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(exit_code)
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Validate { description } => commands::validate::execute(description, cli.json),
        Commands::Run(args) => commands::run::execute(args, cli.json),
    }
}
