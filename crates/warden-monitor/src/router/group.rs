//! Alert groups and their flush timing.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::route::ResolvedRoute;
use crate::types::{AlertEvent, AlertState, Labels};

/// Identity of a group: receiver plus the grouped label values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub receiver: String,
    pub labels: String,
}

impl GroupKey {
    pub fn new(receiver: &str, group_labels: &Labels) -> Self {
        let labels = group_labels
            .iter()
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            receiver: receiver.to_string(),
            labels: format!("{{{}}}", labels),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.receiver, self.labels)
    }
}

/// One flush of one group, handed to fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub receiver: String,
    pub group_key: String,
    pub group_labels: Labels,
    pub firing: Vec<AlertEvent>,
    pub resolved: Vec<AlertEvent>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Firing while anything in the group still fires.
    pub fn status(&self) -> AlertState {
        if self.firing.is_empty() {
            AlertState::Resolved
        } else {
            AlertState::Firing
        }
    }
}

/// Result of flushing a group.
#[derive(Debug, Default)]
pub struct FlushOutcome {
    pub notification: Option<Notification>,
    pub inhibited: usize,
}

/// Alerts sharing a receiver and group label values.
#[derive(Debug, Clone)]
pub struct AlertGroup {
    key: GroupKey,
    route: ResolvedRoute,
    group_labels: Labels,
    firing: BTreeMap<String, AlertEvent>,
    /// Resolved alerts that receivers were told about, awaiting the next flush.
    resolved: BTreeMap<String, AlertEvent>,
    notified: HashSet<String>,
    /// Firing fingerprints in the last notification sent.
    last_sent: BTreeSet<String>,
    last_dispatch: Option<Instant>,
    last_flush: Option<Instant>,
    next_flush: Option<Instant>,
}

impl AlertGroup {
    pub fn new(key: GroupKey, route: ResolvedRoute, group_labels: Labels, now: Instant) -> Self {
        let next_flush = Some(now + route.timing.group_wait);
        Self {
            key,
            route,
            group_labels,
            firing: BTreeMap::new(),
            resolved: BTreeMap::new(),
            notified: HashSet::new(),
            last_sent: BTreeSet::new(),
            last_dispatch: None,
            last_flush: None,
            next_flush,
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn route(&self) -> &ResolvedRoute {
        &self.route
    }

    pub fn firing(&self) -> impl Iterator<Item = &AlertEvent> {
        self.firing.values()
    }

    pub fn next_flush(&self) -> Option<Instant> {
        self.next_flush
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_flush.is_some_and(|at| at <= now)
    }

    /// Nothing firing and nothing left to report.
    pub fn is_finished(&self) -> bool {
        self.firing.is_empty() && self.next_flush.is_none()
    }

    /// Some firing alert has not reached the receiver yet.
    pub fn has_pending(&self) -> bool {
        self.firing.keys().any(|fp| !self.notified.contains(fp))
    }

    pub fn add_firing(&mut self, event: AlertEvent) {
        let fingerprint = event.fingerprint.clone();
        if self.firing.insert(fingerprint, event).is_none() {
            self.touch();
        }
    }

    /// Drop a firing alert. The resolved event is kept for the next flush only
    /// if the receiver was told the alert was firing.
    pub fn resolve(&mut self, fingerprint: &str, event: AlertEvent, now: Instant) {
        if self.firing.remove(fingerprint).is_none() {
            return;
        }
        let was_notified = self.notified.remove(fingerprint);
        if was_notified && self.route.send_resolved {
            self.resolved.insert(fingerprint.to_string(), event);
        }

        if self.firing.is_empty() {
            self.next_flush = (!self.resolved.is_empty()).then_some(now);
        } else if was_notified {
            self.touch();
        }
    }

    /// Mark the group changed. Before the first flush the group_wait
    /// deadline stands; afterwards the group is due one group_interval after
    /// its last flush.
    pub fn touch(&mut self) {
        let Some(last) = self.last_flush else {
            return;
        };
        let candidate = last + self.route.timing.group_interval;
        self.next_flush = Some(match self.next_flush {
            Some(current) => current.min(candidate),
            None => candidate,
        });
    }

    /// Emit the group's visible alerts. A flush whose firing set matches the
    /// last notification, with no resolutions pending, stays silent until
    /// repeat_interval has passed since that notification.
    pub fn flush(&mut self, now: Instant, inhibited: impl Fn(&AlertEvent) -> bool) -> FlushOutcome {
        let mut visible = Vec::new();
        let mut muted = 0;
        for event in self.firing.values() {
            if inhibited(event) {
                muted += 1;
            } else {
                visible.push(event.clone());
            }
        }
        let repeat_interval = self.route.timing.repeat_interval;
        self.last_flush = Some(now);

        let visible_set: BTreeSet<String> = visible.iter().map(|e| e.fingerprint.clone()).collect();
        let repeat_at = self.last_dispatch.map(|at| at + repeat_interval);
        let unchanged = self.resolved.is_empty()
            && !visible_set.is_empty()
            && visible_set == self.last_sent
            && repeat_at.is_some_and(|at| now < at);
        if unchanged {
            self.next_flush = repeat_at;
            return FlushOutcome {
                notification: None,
                inhibited: muted,
            };
        }

        let resolved: Vec<AlertEvent> = std::mem::take(&mut self.resolved).into_values().collect();
        self.next_flush = (!self.firing.is_empty()).then(|| now + repeat_interval);

        if visible.is_empty() && resolved.is_empty() {
            return FlushOutcome {
                notification: None,
                inhibited: muted,
            };
        }

        for event in &visible {
            self.notified.insert(event.fingerprint.clone());
        }
        self.last_sent = visible_set;
        self.last_dispatch = Some(now);

        FlushOutcome {
            notification: Some(Notification {
                receiver: self.key.receiver.clone(),
                group_key: self.key.to_string(),
                group_labels: self.group_labels.clone(),
                firing: visible,
                resolved,
                timestamp: Utc::now(),
            }),
            inhibited: muted,
        }
    }

    /// Drop pending timers.
    pub fn cancel(&mut self) {
        self.next_flush = None;
    }
}
