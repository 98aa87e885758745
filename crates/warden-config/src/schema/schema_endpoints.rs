//! Endpoint definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an endpoint is probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// HTTP(S) GET; any 2xx response is a success.
    #[default]
    Http,
    /// Plain TCP connect to `host:port`.
    Tcp,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointKind::Http => write!(f, "http"),
            EndpointKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// A monitored endpoint as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,

    pub target: String,

    #[serde(default)]
    pub kind: EndpointKind,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Overrides `executor.degraded_threshold_ms` for this endpoint.
    #[serde(default)]
    pub degraded_threshold_ms: Option<u64>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: EndpointKind::default(),
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
            degraded_threshold_ms: None,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: EndpointKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

fn default_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    10
}
