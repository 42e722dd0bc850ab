//! Command implementations for sfctl

pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::Args;

/// Arguments of `sfctl run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Engine description (.json, .yaml or .yml)
    pub description: PathBuf,

    /// Event script, one JSON event per line
    #[arg(short, long)]
    pub events: PathBuf,

    /// Step period in microseconds
    #[arg(long, default_value_t = 1000)]
    pub period_us: u64,

    /// Number of steps to run (default: until the last scripted event)
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Pace steps against the wall clock
    #[arg(long)]
    pub realtime: bool,
}
