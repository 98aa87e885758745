//! Routing tree resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use regex::Regex;
use warden_config::{AlertingConfig, DEFAULT_RECEIVER, RouteConfig};

use crate::error::MonitorError;
use crate::types::Labels;

/// Label predicate. A missing label matches as the empty string.
#[derive(Debug, Clone)]
pub enum Matcher {
    Equal { label: String, value: String },
    Regex { label: String, pattern: Regex },
}

impl Matcher {
    pub fn equal(label: impl Into<String>, value: impl Into<String>) -> Self {
        Matcher::Equal {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Regex matcher anchored at both ends.
    pub fn regex(label: impl Into<String>, pattern: &str) -> Result<Self, MonitorError> {
        let label = label.into();
        let pattern = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            MonitorError::Config(format!("invalid regex for label '{}': {}", label, e))
        })?;
        Ok(Matcher::Regex { label, pattern })
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Matcher::Equal { label, value } => {
                labels.get(label).map(String::as_str).unwrap_or("") == value
            }
            Matcher::Regex { label, pattern } => {
                pattern.is_match(labels.get(label).map(String::as_str).unwrap_or(""))
            }
        }
    }

    /// Build matchers from `match` / `match_re` style maps.
    pub fn from_maps(
        equal: &BTreeMap<String, String>,
        regex: &BTreeMap<String, String>,
    ) -> Result<Vec<Matcher>, MonitorError> {
        let mut matchers: Vec<Matcher> = equal
            .iter()
            .map(|(label, value)| Matcher::equal(label, value))
            .collect();
        for (label, pattern) in regex {
            matchers.push(Matcher::regex(label, pattern)?);
        }
        Ok(matchers)
    }
}

pub fn matches_all(matchers: &[Matcher], labels: &Labels) -> bool {
    matchers.iter().all(|m| m.matches(labels))
}

/// Which labels form the group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    All,
    Labels(Vec<String>),
}

impl GroupBy {
    fn from_config(labels: &[String]) -> Self {
        if labels.iter().any(|l| l == "...") {
            GroupBy::All
        } else {
            GroupBy::Labels(labels.to_vec())
        }
    }

    /// The subset of `labels` used for grouping. Absent labels are left out.
    pub fn group_labels(&self, labels: &Labels) -> Labels {
        match self {
            GroupBy::All => labels.clone(),
            GroupBy::Labels(names) => names
                .iter()
                .filter_map(|n| labels.get(n).map(|v| (n.clone(), v.clone())))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTiming {
    pub group_wait: Duration,
    pub group_interval: Duration,
    pub repeat_interval: Duration,
}

/// Settings of the route an alert landed on, with inheritance applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub receiver: String,
    pub group_by: GroupBy,
    pub timing: RouteTiming,
    pub send_resolved: bool,
    /// Position in the tree, e.g. `root.1.0`.
    pub path: String,
}

#[derive(Debug)]
struct RouteNode {
    matchers: Vec<Matcher>,
    settings: ResolvedRoute,
    children: Vec<RouteNode>,
}

/// Ordered routing tree. The root always matches.
#[derive(Debug)]
pub struct RouteTree {
    root: RouteNode,
    receivers: BTreeSet<String>,
}

impl RouteTree {
    pub fn from_config(config: &AlertingConfig) -> Result<Self, MonitorError> {
        let receivers: BTreeSet<String> = config.receivers.iter().map(|r| r.name.clone()).collect();
        if receivers.len() != config.receivers.len() {
            return Err(MonitorError::Config("duplicate receiver names".to_string()));
        }

        let defaults = ResolvedRoute {
            receiver: DEFAULT_RECEIVER.to_string(),
            group_by: GroupBy::All,
            timing: RouteTiming {
                group_wait: positive_secs("alerting.group_wait_secs", config.group_wait_secs)?,
                group_interval: positive_secs(
                    "alerting.group_interval_secs",
                    config.group_interval_secs,
                )?,
                repeat_interval: positive_secs(
                    "alerting.repeat_interval_secs",
                    config.repeat_interval_secs,
                )?,
            },
            send_resolved: true,
            path: "root".to_string(),
        };

        let mut root = Self::build(&config.route, &defaults, "root".to_string(), &receivers)?;
        root.matchers.clear();

        Ok(Self { root, receivers })
    }

    fn build(
        config: &RouteConfig,
        parent: &ResolvedRoute,
        path: String,
        receivers: &BTreeSet<String>,
    ) -> Result<RouteNode, MonitorError> {
        let receiver = config
            .receiver
            .clone()
            .unwrap_or_else(|| parent.receiver.clone());
        if !receivers.contains(&receiver) {
            return Err(MonitorError::Config(format!(
                "route {} references unknown receiver '{}'",
                path, receiver
            )));
        }

        let timing = RouteTiming {
            group_wait: inherit_secs(&path, "group_wait", config.group_wait_secs, parent.timing.group_wait)?,
            group_interval: inherit_secs(
                &path,
                "group_interval",
                config.group_interval_secs,
                parent.timing.group_interval,
            )?,
            repeat_interval: inherit_secs(
                &path,
                "repeat_interval",
                config.repeat_interval_secs,
                parent.timing.repeat_interval,
            )?,
        };

        let settings = ResolvedRoute {
            receiver,
            group_by: config
                .group_by
                .as_deref()
                .map(GroupBy::from_config)
                .unwrap_or_else(|| parent.group_by.clone()),
            timing,
            send_resolved: config.send_resolved.unwrap_or(parent.send_resolved),
            path: path.clone(),
        };

        let children = config
            .routes
            .iter()
            .enumerate()
            .map(|(i, child)| Self::build(child, &settings, format!("{}.{}", path, i), receivers))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RouteNode {
            matchers: Matcher::from_maps(&config.match_labels, &config.match_re)?,
            settings,
            children,
        })
    }

    /// Walk down the tree, entering the first matching child at each level.
    pub fn resolve(&self, labels: &Labels) -> &ResolvedRoute {
        let mut node = &self.root;
        while let Some(child) = node
            .children
            .iter()
            .find(|c| matches_all(&c.matchers, labels))
        {
            node = child;
        }
        &node.settings
    }

    pub fn receivers(&self) -> impl Iterator<Item = &str> {
        self.receivers.iter().map(String::as_str)
    }
}

fn positive_secs(field: &str, secs: u64) -> Result<Duration, MonitorError> {
    if secs == 0 {
        return Err(MonitorError::Config(format!("{} must be positive", field)));
    }
    Ok(Duration::from_secs(secs))
}

fn inherit_secs(
    path: &str,
    field: &str,
    own: Option<u64>,
    parent: Duration,
) -> Result<Duration, MonitorError> {
    match own {
        Some(secs) => positive_secs(&format!("{}.{}", path, field), secs),
        None => Ok(parent),
    }
}
