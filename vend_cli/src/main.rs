#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Headless front end and composition root for the kiosk core.

mod cli;
mod error_fmt;
mod fill;
mod monitor;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::WrapErr;
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};
use vend_core::{FillOutcome, VolumeProfile};

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let _ = JSON_MODE.set(json);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", error_fmt::format_error_json(&e));
            } else {
                eprintln!("{}", error_fmt::humanize(&e));
            }
            error_fmt::exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> eyre::Result<i32> {
    let cfg = vend_config::load_or_create(&cli.config)?;
    cfg.validate().wrap_err("invalid configuration")?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.app)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.cmd {
        Commands::Fill {
            volume,
            simulate,
            print_runtime,
        } => {
            let started = Instant::now();
            let (report, mode) = fill::run_fill(&cfg, &volume, simulate, cli.json)?;
            if cli.json {
                println!("{}", fill::result_line(&report, mode));
            }
            if report.outcome == FillOutcome::Completed {
                if !cli.json {
                    println!("{}", fill::summary(&report));
                }
                if print_runtime {
                    println!("Runtime: {} ms", started.elapsed().as_millis());
                }
            } else if cli.json {
                eprintln!("{}", error_fmt::format_outcome_json(&report));
            } else {
                eprintln!("{}", error_fmt::humanize_outcome(&report));
            }
            Ok(error_fmt::exit_code_for_outcome(report.outcome))
        }
        Commands::Monitor {
            cycles,
            no_telemetry,
        } => {
            monitor::run_monitor(&cfg, cycles, !no_telemetry, cli.json)?;
            Ok(0)
        }
        Commands::Volumes => {
            for v in VolumeProfile::all() {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({ "name": v.name, "pulses": v.pulses, "price": v.price })
                    );
                } else {
                    println!("{:<8} {:>5} pulses  {}", v.display_name, v.pulses, v.price);
                }
            }
            Ok(0)
        }
        Commands::SelfCheck => {
            let platform = fill::platform_for(false);
            let mode = platform.initialize();
            println!("config: ok");
            println!("hardware: {mode:?}");
            println!("volumes: {}", VolumeProfile::all().len());
            Ok(0)
        }
    }
}

/// Console layer on stderr (pretty or JSON) plus an optional JSON file layer.
///
/// Level precedence: `--log-level`, then `RUST_LOG`, then `[app].log_level`.
fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    app: &vend_config::AppCfg,
) -> eyre::Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&app.log_level)),
    }
    .wrap_err("invalid log level")?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).with_target(false).boxed()
    });

    if let Some(path) = app.log_file.as_deref().filter(|p| !p.is_empty()) {
        let path = Path::new(path);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("log_file {} has no file name", path.display()))?;
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        let _ = FILE_GUARD.set(guard);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {e}"))
}
