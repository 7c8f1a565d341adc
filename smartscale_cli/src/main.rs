#[cfg_attr(all(feature = "hardware", target_os = "linux"), allow(dead_code))]
mod backend;
mod cli;
mod commands;
mod error_fmt;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let _ = color_eyre::install();
    let cfg = smartscale_config::load_file(&cli.config)
        .wrap_err_with(|| format!("invalid configuration in {}", cli.config.display()))?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    let open_backend = |_reference_g: Option<f32>| backend::hardware(&cfg);
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let open_backend = |reference_g: Option<f32>| backend::simulated(&cfg, reference_g);

    match cli.cmd {
        Commands::Calibrate { reference_g } => {
            commands::calibrate(open_backend(Some(reference_g))?, reference_g, cli.json)
        }
        Commands::Monitor { ticks } => commands::monitor(open_backend(None)?, &cfg, ticks, cli.json),
        Commands::Factor => commands::factor(open_backend(None)?, cli.json),
        Commands::SelfCheck => commands::self_check(open_backend(None)?, &cfg, cli.json),
    }
}

/// Console logs go to stderr so stdout stays clean for results; an optional
/// JSON-lines file sink comes from `[logging]`.
fn init_tracing(json: bool, level: Option<&str>, logging: &smartscale_config::Logging) -> Result<()> {
    let level = level.or(logging.level.as_deref()).unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .wrap_err("initialize logging")?;
    Ok(())
}
