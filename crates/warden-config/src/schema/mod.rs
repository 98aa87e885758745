//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod schema_alerting;
mod schema_endpoints;

pub use schema_alerting::*;
pub use schema_endpoints::*;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub fanout: FanOutConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    #[serde(default)]
    pub alerting: AlertingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9400
}

/// Process lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Time allowed for in-flight probes and deliveries to finish on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

fn default_shutdown_grace() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit console logs as JSON lines.
    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rolling log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Check executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on probes running at the same time across all endpoints.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Probe latency above which a reachable endpoint is reported as degraded.
    #[serde(default)]
    pub degraded_threshold_ms: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: default_max_concurrent_probes(),
            degraded_threshold_ms: None,
        }
    }
}

fn default_max_concurrent_probes() -> usize {
    16
}

/// Status tracker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Consecutive non-healthy results required to leave Healthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive healthy results required to become Healthy.
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_threshold: default_recovery_threshold(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_recovery_threshold() -> u32 {
    1
}

/// Notification fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutConfig {
    /// Outbound queue length per live subscriber.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Receiver deliveries allowed to run at once.
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            delivery_timeout_secs: default_delivery_timeout(),
        }
    }
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_max_concurrent_deliveries() -> usize {
    8
}

fn default_delivery_timeout() -> u64 {
    10
}

/// Privileged operations a caller may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Run an on-demand check against an endpoint.
    ManualTrigger,
    /// Read the full metrics detail over the real-time gateway.
    MetricsDetail,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::ManualTrigger => write!(f, "manual_trigger"),
            Capability::MetricsDetail => write!(f, "metrics_detail"),
        }
    }
}

/// API access configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub tokens: Vec<ApiTokenConfig>,
}

/// A bearer token and the capabilities it grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTokenConfig {
    pub token: String,

    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
