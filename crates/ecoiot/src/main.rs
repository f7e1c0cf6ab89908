mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ecoiot_core::CoordinatorConfig;

use crate::cli::{Cli, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = build_coordinator_config(&cli.global)?;

    tracing::debug!(command = ?cli.command, host = %config.host, "dispatching command");
    commands::dispatch(cli.command, config, &cli.global).await
}

/// Build a `CoordinatorConfig` from the config file, environment, and CLI overrides.
fn build_coordinator_config(global: &GlobalOpts) -> Result<CoordinatorConfig, CliError> {
    let mut cfg = ecoiot_config::load_config(global.config.as_deref())?;

    if let Some(host) = &global.host {
        cfg.host.clone_from(host);
    }
    if cfg.host.trim().is_empty() {
        let path = global
            .config
            .clone()
            .unwrap_or_else(ecoiot_config::config_path);
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }

    Ok(cfg.to_coordinator_config()?)
}
