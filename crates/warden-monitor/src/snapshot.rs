//! Point-in-time views handed to API consumers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CheckResult, HealthStatus, Labels};

/// One endpoint in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    pub name: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_transition_at: Option<DateTime<Utc>>,
    pub last_check: Option<CheckResult>,
    pub checks_total: u64,
    pub failures_total: u64,
    pub labels: Labels,
}

/// Live alert routing statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    /// Active alert groups.
    pub groups: usize,
    /// Alerts currently firing, inhibited or not.
    pub firing: usize,
    /// Firing alerts currently suppressed by an inhibit rule.
    pub inhibited: usize,
    pub firing_by_severity: BTreeMap<String, usize>,
}

/// Monitoring state at the moment it was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub generated_at: DateTime<Utc>,
    pub ready: bool,
    pub endpoints: Vec<EndpointSnapshot>,
    pub status_counts: BTreeMap<HealthStatus, usize>,
    pub alerts: RouterStats,
    pub subscribers: usize,
}

impl MonitorSnapshot {
    /// Worst status across all endpoints. Unknown endpoints do not count
    /// against the total.
    pub fn overall_status(&self) -> HealthStatus {
        let count = |s: HealthStatus| self.status_counts.get(&s).copied().unwrap_or(0);
        if count(HealthStatus::Unhealthy) > 0 {
            HealthStatus::Unhealthy
        } else if count(HealthStatus::Degraded) > 0 {
            HealthStatus::Degraded
        } else if count(HealthStatus::Healthy) > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unknown
        }
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointSnapshot> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}
