//! Inhibit rules.

use warden_config::InhibitRuleConfig;

use super::route::{Matcher, matches_all};
use crate::error::MonitorError;
use crate::types::{AlertEvent, Labels};

/// Mutes target alerts while a matching source alert fires.
#[derive(Debug, Clone)]
pub struct InhibitRule {
    source: Vec<Matcher>,
    target: Vec<Matcher>,
    equal: Vec<String>,
}

impl InhibitRule {
    pub fn new(source: Vec<Matcher>, target: Vec<Matcher>, equal: Vec<String>) -> Self {
        Self {
            source,
            target,
            equal,
        }
    }

    pub fn from_config(config: &InhibitRuleConfig) -> Result<Self, MonitorError> {
        let source = Matcher::from_maps(&config.source_match, &config.source_match_re)?;
        let target = Matcher::from_maps(&config.target_match, &config.target_match_re)?;
        if source.is_empty() || target.is_empty() {
            return Err(MonitorError::Config(
                "inhibit rules need both source and target matchers".to_string(),
            ));
        }
        Ok(Self::new(source, target, config.equal.clone()))
    }

    pub fn matches_target(&self, labels: &Labels) -> bool {
        matches_all(&self.target, labels)
    }

    /// Whether `source` mutes `target` under this rule.
    pub fn inhibits(&self, source: &AlertEvent, target: &AlertEvent) -> bool {
        source.fingerprint != target.fingerprint
            && matches_all(&self.source, &source.labels)
            && self.matches_target(&target.labels)
            && self
                .equal
                .iter()
                .all(|label| source.labels.get(label) == target.labels.get(label))
    }
}

/// Whether any rule mutes `target` given the alerts currently firing.
pub fn is_inhibited<'a>(
    rules: &[InhibitRule],
    target: &AlertEvent,
    firing: impl Iterator<Item = &'a AlertEvent> + Clone,
) -> bool {
    rules
        .iter()
        .filter(|rule| rule.matches_target(&target.labels))
        .any(|rule| firing.clone().any(|source| rule.inhibits(source, target)))
}
