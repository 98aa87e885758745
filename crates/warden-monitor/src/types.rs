//! Records passed between the executor, tracker, router and fan-out.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_config::EndpointKind;

/// Label set. Ordered so group keys and fingerprints are stable.
pub type Labels = BTreeMap<String, String>;

/// A validated endpoint definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub target: String,
    pub kind: EndpointKind,
    pub interval: Duration,
    pub timeout: Duration,
    /// Latency above which a successful probe counts as degraded.
    pub degraded_after: Option<Duration>,
    pub labels: Labels,
}

/// Tracked health of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Degraded or Unhealthy.
    pub fn is_failing(&self) -> bool {
        matches!(self, HealthStatus::Degraded | HealthStatus::Unhealthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a probe produced no verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownReason {
    Timeout,
    Cancelled,
}

impl std::fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownReason::Timeout => write!(f, "timeout"),
            UnknownReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown(UnknownReason),
}

impl CheckStatus {
    pub fn health(&self) -> HealthStatus {
        match self {
            CheckStatus::Healthy => HealthStatus::Healthy,
            CheckStatus::Degraded => HealthStatus::Degraded,
            CheckStatus::Unhealthy => HealthStatus::Unhealthy,
            CheckStatus::Unknown(_) => HealthStatus::Unknown,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, CheckStatus::Healthy)
    }
}

/// Result of one probe against one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub status: CheckStatus,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    pub fn new(check_name: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            check_name: check_name.into(),
            status,
            timestamp: Utc::now(),
            duration_ms: 0,
            detail: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// What started a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Scheduled => write!(f, "scheduled"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Firing,
    Resolved,
}

/// A firing or resolved alert produced by a status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// `<endpoint>:<status>`.
    pub fingerprint: String,
    pub endpoint: String,
    pub state: AlertState,
    /// The failing tier this alert is about.
    pub status: HealthStatus,
    pub labels: Labels,
    pub annotations: Labels,
    pub starts_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Fingerprint of the tier this firing alert replaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
}

impl AlertEvent {
    pub fn is_firing(&self) -> bool {
        self.state == AlertState::Firing
    }

    pub fn severity(&self) -> Option<&str> {
        self.labels.get("severity").map(String::as_str)
    }
}

pub fn fingerprint(endpoint: &str, status: HealthStatus) -> String {
    format!("{}:{}", endpoint, status)
}
