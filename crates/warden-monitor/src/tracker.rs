//! Per-endpoint health state machine.
//!
//! Each endpoint has its own lock, so results for different endpoints never
//! contend. Consumers only ever see cloned [`EndpointState`] values.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};
use warden_config::TrackerConfig;

use crate::error::MonitorError;
use crate::registry::EndpointRegistry;
use crate::types::{
    AlertEvent, AlertState, CheckResult, CheckStatus, HealthStatus, Labels, fingerprint,
};

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;

/// A change of `current_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthStatus,
    pub to: HealthStatus,
    pub at: DateTime<Utc>,
    /// When the previous status was entered.
    pub previous_at: Option<DateTime<Utc>>,
}

/// Tracked state of one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointState {
    pub current_status: HealthStatus,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_transition_at: Option<DateTime<Utc>>,
    pub last_result: Option<CheckResult>,
    pub checks_total: u64,
    pub failures_total: u64,
    /// The last `failure_threshold` non-healthy statuses of the current streak.
    #[serde(skip)]
    recent_failures: VecDeque<CheckStatus>,
}

impl EndpointState {
    pub fn new() -> Self {
        Self {
            current_status: HealthStatus::Unknown,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_transition_at: None,
            last_result: None,
            checks_total: 0,
            failures_total: 0,
            recent_failures: VecDeque::new(),
        }
    }

    /// Fold one result into the state, returning the transition if the
    /// status changed.
    pub fn apply(&mut self, result: CheckResult, thresholds: &TrackerConfig) -> Option<Transition> {
        let status = result.status;
        let at = result.timestamp;
        self.checks_total += 1;
        self.last_result = Some(result);

        let target = if status.is_healthy() {
            self.consecutive_failures = 0;
            self.recent_failures.clear();
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            (self.consecutive_successes >= thresholds.recovery_threshold)
                .then_some(HealthStatus::Healthy)
        } else {
            self.failures_total += 1;
            self.consecutive_successes = 0;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.recent_failures.push_back(status);
            while self.recent_failures.len() > thresholds.failure_threshold as usize {
                self.recent_failures.pop_front();
            }
            (self.consecutive_failures >= thresholds.failure_threshold)
                .then(|| self.failing_tier())
        };

        match target {
            Some(to) if to != self.current_status => {
                let transition = Transition {
                    from: self.current_status,
                    to,
                    at,
                    previous_at: self.last_transition_at,
                };
                self.current_status = to;
                self.last_transition_at = Some(at);
                Some(transition)
            }
            _ => None,
        }
    }

    /// Tier agreed on by the recent failure window. Unknown entries defer to
    /// the others; a window of only Unknown counts as Unhealthy. A mixed
    /// window keeps the current failing tier.
    fn failing_tier(&self) -> HealthStatus {
        let degraded = self
            .recent_failures
            .iter()
            .any(|s| *s == CheckStatus::Degraded);
        let unhealthy = self
            .recent_failures
            .iter()
            .any(|s| *s == CheckStatus::Unhealthy);

        match (degraded, unhealthy) {
            (false, _) => HealthStatus::Unhealthy,
            (true, false) => HealthStatus::Degraded,
            (true, true) if self.current_status.is_failing() => self.current_status,
            (true, true) => HealthStatus::Degraded,
        }
    }
}

impl Default for EndpointState {
    fn default() -> Self {
        Self::new()
    }
}

struct EndpointSlot {
    labels: Labels,
    state: Mutex<EndpointState>,
}

/// Status tracker for every registered endpoint.
pub struct StatusTracker {
    thresholds: TrackerConfig,
    slots: HashMap<String, EndpointSlot>,
    observed: AtomicUsize,
    ready: AtomicBool,
}

impl StatusTracker {
    pub fn new(registry: &EndpointRegistry, thresholds: TrackerConfig) -> Result<Self, MonitorError> {
        if thresholds.failure_threshold == 0 || thresholds.recovery_threshold == 0 {
            return Err(MonitorError::Config(
                "tracker thresholds must be positive".to_string(),
            ));
        }

        let slots = registry
            .endpoints()
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    EndpointSlot {
                        labels: e.labels.clone(),
                        state: Mutex::new(EndpointState::new()),
                    },
                )
            })
            .collect();

        Ok(Self {
            thresholds,
            slots,
            observed: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
        })
    }

    pub fn thresholds(&self) -> &TrackerConfig {
        &self.thresholds
    }

    /// Record a result. Returns the alert produced by a status change, if any.
    pub fn record(&self, result: CheckResult) -> Result<Option<AlertEvent>, MonitorError> {
        let slot = self
            .slots
            .get(&result.check_name)
            .ok_or_else(|| MonitorError::UnknownEndpoint(result.check_name.clone()))?;

        let name = result.check_name.clone();
        let detail = result.detail.clone();

        let (transition, first) = {
            let mut state = slot.state.lock();
            let first = state.checks_total == 0;
            (state.apply(result, &self.thresholds), first)
        };

        if first {
            self.mark_observed();
        }

        let transition = match transition {
            Some(t) => t,
            None => return Ok(None),
        };
        info!("Endpoint {} changed {} -> {}", name, transition.from, transition.to);

        Ok(Self::alert_for(&name, &slot.labels, transition, detail))
    }

    fn mark_observed(&self) {
        let seen = self.observed.fetch_add(1, Ordering::SeqCst) + 1;
        if seen >= self.slots.len() && !self.ready.swap(true, Ordering::SeqCst) {
            info!("All {} endpoints have reported, tracker is ready", self.slots.len());
        }
    }

    fn alert_for(
        name: &str,
        endpoint_labels: &Labels,
        transition: Transition,
        detail: Option<String>,
    ) -> Option<AlertEvent> {
        let (state, status, supersedes, starts_at, resolved_at) = match (transition.from, transition.to) {
            (from, to) if to.is_failing() => (
                AlertState::Firing,
                to,
                from.is_failing().then(|| fingerprint(name, from)),
                transition.at,
                None,
            ),
            (from, HealthStatus::Healthy) if from.is_failing() => (
                AlertState::Resolved,
                from,
                None,
                transition.previous_at.unwrap_or(transition.at),
                Some(transition.at),
            ),
            _ => {
                debug!("Endpoint {} became {} with nothing firing", name, transition.to);
                return None;
            }
        };

        let mut labels = endpoint_labels.clone();
        labels.insert("endpoint".to_string(), name.to_string());
        labels.insert("alertname".to_string(), alert_name(status).to_string());
        labels
            .entry("severity".to_string())
            .or_insert_with(|| default_severity(status).to_string());

        let mut annotations = Labels::new();
        annotations.insert(
            "summary".to_string(),
            format!("Endpoint {} is {}", name, status),
        );
        if let Some(detail) = detail {
            annotations.insert("description".to_string(), detail);
        }

        Some(AlertEvent {
            fingerprint: fingerprint(name, status),
            endpoint: name.to_string(),
            state,
            status,
            labels,
            annotations,
            starts_at,
            resolved_at,
            supersedes,
        })
    }

    /// Copy of one endpoint's state.
    pub fn state(&self, name: &str) -> Option<EndpointState> {
        self.slots.get(name).map(|slot| slot.state.lock().clone())
    }

    /// Copies of every endpoint's state, ordered by name.
    pub fn states(&self) -> Vec<(String, EndpointState)> {
        let mut states: Vec<_> = self
            .slots
            .iter()
            .map(|(name, slot)| (name.clone(), slot.state.lock().clone()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// True once every endpoint has produced at least one result. Latched.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) || self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn alert_name(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Degraded => "EndpointDegraded",
        _ => "EndpointUnhealthy",
    }
}

fn default_severity(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Degraded => "warning",
        _ => "critical",
    }
}
