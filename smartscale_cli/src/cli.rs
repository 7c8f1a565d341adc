//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Keeps the non-blocking file writer flushing until the process exits.
pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "smartscale", version, about = "Smart scale input and calibration CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/smartscale.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); overrides `[logging] level`
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for the scale factor against a known reference weight
    Calibrate {
        /// Mass of the reference weight in grams
        #[arg(long = "reference-g", value_name = "GRAMS")]
        reference_g: f32,
    },
    /// Poll the configured buttons and encoder, printing every event
    Monitor {
        /// Number of polling ticks to run
        #[arg(long, default_value_t = 100)]
        ticks: u64,
    },
    /// Print the persisted scale factor
    Factor,
    /// Build the device from config and report problems
    SelfCheck,
}
