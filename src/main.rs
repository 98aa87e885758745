//! Warden - endpoint monitoring and alert routing.
//!
//! Main entry point for the Warden CLI and daemon.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use warden_config::{Config, ConfigLoader, ValidationWarning};
use warden_daemon::Daemon;
use warden_monitor::{LogSink, Monitor};

mod cli;
mod logging;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&cli.config).await,
        Commands::Validate => validate(&cli.config),
        Commands::Check { endpoint } => check(&cli.config, &endpoint).await,
    }
}

/// Load and validate, then bring up logging so warnings are recorded.
fn load(path: &Path) -> anyhow::Result<Config> {
    let (config, warnings) = ConfigLoader::load_validated(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    logging::init_tracing(&config.logging)?;
    log_warnings(&warnings);
    Ok(config)
}

fn log_warnings(warnings: &[ValidationWarning]) {
    for warning in warnings {
        warn!("Config warning at {}: {}", warning.path, warning.message);
    }
}

async fn run(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    info!("Starting Warden v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Monitoring {} endpoints, API on {}:{}",
        config.endpoints.len(),
        config.server.host,
        config.server.port
    );

    let daemon = Daemon::new(config, Arc::new(LogSink))?;
    daemon.run().await?;
    Ok(())
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    // Routing regexes and receiver references are only checked when the
    // monitor is assembled.
    Monitor::new(&config, Arc::new(LogSink)).context("routing configuration rejected")?;
    println!(
        "Configuration OK: {} endpoints, {} receivers, {} inhibit rules",
        config.endpoints.len(),
        config.alerting.receivers.len(),
        config.alerting.inhibit_rules.len()
    );
    Ok(())
}

async fn check(path: &Path, endpoint: &str) -> anyhow::Result<()> {
    let config = load(path)?;
    let monitor = Monitor::new(&config, Arc::new(LogSink))?;
    let result = monitor
        .perform_check(endpoint, &CancellationToken::new())
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.status.is_healthy() {
        bail!("{} is {}", endpoint, result.status.health());
    }
    Ok(())
}
