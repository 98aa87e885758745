//! Alert routing.
//!
//! [`AlertRouter`] is a plain state machine driven with explicit instants:
//! events go in through [`AlertRouter::process`], notifications come out of
//! [`AlertRouter::flush_due`]. [`RouterDriver`] owns it inside a single task
//! and wakes up at [`AlertRouter::next_deadline`].

mod driver;
mod group;
mod inhibit;
mod route;

pub use driver::RouterDriver;
pub use group::{AlertGroup, FlushOutcome, GroupKey, Notification};
pub use inhibit::{InhibitRule, is_inhibited};
pub use route::{GroupBy, Matcher, ResolvedRoute, RouteTiming, RouteTree};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info};
use warden_config::AlertingConfig;

use crate::error::MonitorError;
use crate::metrics::{Counter, MonitorMetrics};
use crate::snapshot::RouterStats;
use crate::types::{AlertEvent, AlertState};

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

/// A firing alert and the group it joined.
#[derive(Debug, Clone)]
struct FiringEntry {
    event: AlertEvent,
    group: GroupKey,
}

pub struct AlertRouter {
    tree: RouteTree,
    inhibit_rules: Vec<InhibitRule>,
    groups: BTreeMap<GroupKey, AlertGroup>,
    firing: HashMap<String, FiringEntry>,
    metrics: Arc<MonitorMetrics>,
}

impl AlertRouter {
    pub fn new(tree: RouteTree, inhibit_rules: Vec<InhibitRule>, metrics: Arc<MonitorMetrics>) -> Self {
        Self {
            tree,
            inhibit_rules,
            groups: BTreeMap::new(),
            firing: HashMap::new(),
            metrics,
        }
    }

    pub fn from_config(config: &AlertingConfig, metrics: Arc<MonitorMetrics>) -> Result<Self, MonitorError> {
        let tree = RouteTree::from_config(config)?;
        let rules = config
            .inhibit_rules
            .iter()
            .map(InhibitRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(tree, rules, metrics))
    }

    pub fn tree(&self) -> &RouteTree {
        &self.tree
    }

    /// Fold one event into the groups.
    pub fn process(&mut self, event: AlertEvent, now: Instant) {
        match event.state {
            AlertState::Firing => {
                if let Some(previous) = event.supersedes.clone() {
                    self.resolve(&previous, None, now);
                }
                self.fire(event, now);
            }
            AlertState::Resolved => {
                let fingerprint = event.fingerprint.clone();
                self.resolve(&fingerprint, Some(event), now);
            }
        }
        self.prune();
    }

    fn fire(&mut self, event: AlertEvent, now: Instant) {
        let fingerprint = event.fingerprint.clone();

        if let Some(entry) = self.firing.get_mut(&fingerprint) {
            debug!("Alert {} already firing, refreshing", fingerprint);
            entry.event = event.clone();
            if let Some(group) = self.groups.get_mut(&entry.group) {
                group.add_firing(event);
            }
            return;
        }

        let route = self.tree.resolve(&event.labels).clone();
        let group_labels = route.group_by.group_labels(&event.labels);
        let key = GroupKey::new(&route.receiver, &group_labels);
        debug!("Alert {} routed to {} via {}", fingerprint, key, route.path);

        let group = self.groups.entry(key.clone()).or_insert_with(|| {
            debug!("Creating alert group {}", key);
            AlertGroup::new(key.clone(), route, group_labels, now)
        });
        group.add_firing(event.clone());
        self.firing.insert(fingerprint, FiringEntry { event, group: key });
    }

    fn resolve(&mut self, fingerprint: &str, event: Option<AlertEvent>, now: Instant) {
        let Some(entry) = self.firing.remove(fingerprint) else {
            debug!("Ignoring resolution of {}: not firing", fingerprint);
            return;
        };

        let event = event.unwrap_or_else(|| {
            let mut resolved = entry.event.clone();
            resolved.state = AlertState::Resolved;
            resolved.resolved_at = Some(Utc::now());
            resolved
        });

        if let Some(group) = self.groups.get_mut(&entry.group) {
            group.resolve(fingerprint, event, now);
        }

        // A resolved source may release alerts it was muting.
        for group in self.groups.values_mut() {
            if group.has_pending() {
                group.touch();
            }
        }
    }

    fn prune(&mut self) {
        self.groups.retain(|key, group| {
            let keep = !group.is_finished();
            if !keep {
                debug!("Removing alert group {}", key);
            }
            keep
        });
    }

    /// Flush every group due at `now`.
    pub fn flush_due(&mut self, now: Instant) -> Vec<Notification> {
        let rules = &self.inhibit_rules;
        let firing = &self.firing;
        let mut notifications = Vec::new();

        for group in self.groups.values_mut().filter(|g| g.is_due(now)) {
            let outcome = group.flush(now, |event| {
                is_inhibited(rules, event, firing.values().map(|entry| &entry.event))
            });
            if outcome.inhibited > 0 {
                self.metrics.add(Counter::AlertsInhibitedTotal, outcome.inhibited as u64);
                debug!("{} alerts inhibited in group {}", outcome.inhibited, group.key());
            }
            if let Some(notification) = outcome.notification {
                self.metrics.inc(Counter::NotificationsTotal);
                notifications.push(notification);
            }
        }

        self.prune();
        notifications
    }

    /// Earliest pending flush.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.groups.values().filter_map(AlertGroup::next_flush).min()
    }

    pub fn stats(&self) -> RouterStats {
        let firing = || self.firing.values().map(|entry| &entry.event);
        let mut stats = RouterStats {
            groups: self.groups.len(),
            firing: self.firing.len(),
            ..RouterStats::default()
        };
        for event in firing() {
            if is_inhibited(&self.inhibit_rules, event, firing()) {
                stats.inhibited += 1;
            }
            let severity = event.severity().unwrap_or("none").to_string();
            *stats.firing_by_severity.entry(severity).or_insert(0) += 1;
        }
        stats
    }

    pub fn group(&self, key: &GroupKey) -> Option<&AlertGroup> {
        self.groups.get(key)
    }

    pub fn groups(&self) -> impl Iterator<Item = &AlertGroup> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn firing_count(&self) -> usize {
        self.firing.len()
    }

    /// Cancel every group timer and forget all state.
    pub fn clear(&mut self) {
        if !self.groups.is_empty() {
            info!("Dropping {} alert groups", self.groups.len());
        }
        for group in self.groups.values_mut() {
            group.cancel();
        }
        self.groups.clear();
        self.firing.clear();
    }
}
