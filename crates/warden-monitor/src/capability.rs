//! Capability sets presented by callers of privileged operations.

use std::collections::BTreeSet;

use warden_config::Capability;

use crate::error::MonitorError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    granted: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// No capabilities.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        [Capability::ManualTrigger, Capability::MetricsDetail]
            .into_iter()
            .collect()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.granted.insert(capability);
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), MonitorError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(MonitorError::Forbidden { capability })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.granted.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}
