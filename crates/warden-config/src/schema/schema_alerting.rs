//! Alert routing and inhibition configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `[alerting]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    #[serde(default = "default_group_wait")]
    pub group_wait_secs: u64,

    #[serde(default = "default_group_interval")]
    pub group_interval_secs: u64,

    #[serde(default = "default_repeat_interval")]
    pub repeat_interval_secs: u64,

    #[serde(default = "default_receivers")]
    pub receivers: Vec<ReceiverConfig>,

    /// The default route. Child routes are tried in declaration order.
    #[serde(default)]
    pub route: RouteConfig,

    #[serde(default)]
    pub inhibit_rules: Vec<InhibitRuleConfig>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            group_wait_secs: default_group_wait(),
            group_interval_secs: default_group_interval(),
            repeat_interval_secs: default_repeat_interval(),
            receivers: default_receivers(),
            route: RouteConfig::default(),
            inhibit_rules: Vec::new(),
        }
    }
}

fn default_group_wait() -> u64 {
    30
}

fn default_group_interval() -> u64 {
    300
}

fn default_repeat_interval() -> u64 {
    4 * 60 * 60
}

pub const DEFAULT_RECEIVER: &str = "default";

fn default_receivers() -> Vec<ReceiverConfig> {
    vec![ReceiverConfig::new(DEFAULT_RECEIVER)]
}

/// A named notification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    pub name: String,
}

impl ReceiverConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A node in the routing tree. Unset fields inherit from the parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub receiver: Option<String>,

    /// Label equality matchers.
    #[serde(default, rename = "match")]
    pub match_labels: BTreeMap<String, String>,

    /// Label regex matchers, anchored at both ends.
    #[serde(default)]
    pub match_re: BTreeMap<String, String>,

    /// Labels used to build the group key. `["..."]` groups by every label.
    #[serde(default)]
    pub group_by: Option<Vec<String>>,

    #[serde(default)]
    pub group_wait_secs: Option<u64>,

    #[serde(default)]
    pub group_interval_secs: Option<u64>,

    #[serde(default)]
    pub repeat_interval_secs: Option<u64>,

    #[serde(default)]
    pub send_resolved: Option<bool>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl RouteConfig {
    pub fn to_receiver(receiver: impl Into<String>) -> Self {
        Self {
            receiver: Some(receiver.into()),
            ..Self::default()
        }
    }

    pub fn with_match(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(label.into(), value.into());
        self
    }

    pub fn with_match_re(mut self, label: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.match_re.insert(label.into(), pattern.into());
        self
    }

    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }
}

/// Suppresses target alerts while a matching source alert fires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InhibitRuleConfig {
    #[serde(default)]
    pub source_match: BTreeMap<String, String>,

    #[serde(default)]
    pub source_match_re: BTreeMap<String, String>,

    #[serde(default)]
    pub target_match: BTreeMap<String, String>,

    #[serde(default)]
    pub target_match_re: BTreeMap<String, String>,

    /// Labels that must carry the same value on source and target.
    #[serde(default)]
    pub equal: Vec<String>,
}
