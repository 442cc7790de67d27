//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "vend_cli", version, about = "Water kiosk CLI")]
pub struct Cli {
    /// Path to config TOML; created with defaults when missing
    #[arg(long, value_name = "FILE", default_value = "vend_config.toml")]
    pub config: PathBuf,

    /// Emit JSON lines instead of human-readable output
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides RUST_LOG and [app].log_level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispense one catalog volume
    Fill {
        /// Catalog name, e.g. "350 ml" or "1 Liter"
        #[arg(long)]
        volume: String,
        /// Never probe the GPIO; always run on the simulator
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
        /// Print total runtime on completion
        #[arg(long, action = ArgAction::SetTrue)]
        print_runtime: bool,
    },
    /// Poll water-quality sensors and forward telemetry
    Monitor {
        /// Stop after this many readings (default: run until Ctrl-C)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Do not post readings to the backend
        #[arg(long, action = ArgAction::SetTrue)]
        no_telemetry: bool,
    },
    /// List the volume catalog
    Volumes,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
