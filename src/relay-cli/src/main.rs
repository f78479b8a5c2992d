//! Relay CLI entry point.
//!
//! Provides subcommands for:
//! - Listing and inspecting registered commands
//! - Routing free-text input
//! - Checking permissions
//! - Dispatching commands, one-shot or line by line from stdin

use anyhow::{Context, Result};
use clap::Parser;
use relay_cli::RelayConfig;
use relay_cli::cli::{Cli, LogLevel, dispatch_command};
use tracing::debug;

/// Environment variable overriding the log level.
const LOG_LEVEL_ENV: &str = "RELAY_LOG_LEVEL";

fn init_logging(cli: &Cli, config: &RelayConfig) {
    let log_level = if cli.trace {
        LogLevel::Trace
    } else if cli.verbose {
        LogLevel::Debug
    } else if let Some(level) = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|env_level| LogLevel::from_str_loose(&env_level))
    {
        level
    } else if let Some(level) = cli.log_level {
        level
    } else {
        config
            .log_level
            .as_deref()
            .and_then(LogLevel::from_str_loose)
            .unwrap_or_default()
    };

    let filter_str = if std::env::var("RUST_LOG").is_ok() {
        format!(
            "error,relay={},relay_cli={},relay_commands={},relay_policy={}",
            log_level.as_filter_str(),
            log_level.as_filter_str(),
            log_level.as_filter_str(),
            log_level.as_filter_str()
        )
    } else {
        log_level.as_filter_str().to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(&filter_str)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(dir) = &cli.project {
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to enter project directory {}", dir.display()))?;
    }

    let (config, config_path) = RelayConfig::load(cli.config.as_deref())?;
    init_logging(&cli, &config);
    match config_path {
        Some(path) => debug!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    dispatch_command(cli, config).await
}
