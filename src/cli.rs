//! CLI definitions for Warden.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Warden CLI.
#[derive(Debug, Parser)]
#[command(name = "warden")]
#[command(about = "Endpoint monitoring and alert routing daemon")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/warden.toml", global = true, env = "WARDEN_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run the monitor and API in the foreground (default)
    Run,

    /// Check the configuration and routing tree, then exit
    Validate,

    /// Probe one endpoint once and print the result
    Check {
        /// Endpoint name from the configuration
        endpoint: String,
    },
}
