//! Endpoint registry.
//!
//! Built once from configuration and never mutated afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;
use warden_config::{EndpointConfig, EndpointKind};

use crate::error::MonitorError;
use crate::types::Endpoint;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

/// Immutable set of validated endpoints, ordered by name.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<Arc<Endpoint>>,
    index: HashMap<String, usize>,
}

impl EndpointRegistry {
    /// Validate endpoint definitions and build the registry.
    ///
    /// `default_degraded_ms` applies to endpoints without their own threshold.
    pub fn from_config(
        configs: &[EndpointConfig],
        default_degraded_ms: Option<u64>,
    ) -> Result<Self, MonitorError> {
        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(configs.len());

        for config in configs {
            let endpoint = Self::validate(config, default_degraded_ms)?;
            if !seen.insert(endpoint.name.clone()) {
                return Err(MonitorError::Config(format!(
                    "duplicate endpoint name '{}'",
                    endpoint.name
                )));
            }
            endpoints.push(Arc::new(endpoint));
        }

        endpoints.sort_by(|a, b| a.name.cmp(&b.name));
        let index = endpoints
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();

        if endpoints.is_empty() {
            warn!("Endpoint registry is empty");
        } else {
            info!("Registered {} endpoints", endpoints.len());
        }

        Ok(Self { endpoints, index })
    }

    fn validate(
        config: &EndpointConfig,
        default_degraded_ms: Option<u64>,
    ) -> Result<Endpoint, MonitorError> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(MonitorError::Config("endpoint name cannot be empty".into()));
        }
        let target = config.target.trim();
        if target.is_empty() {
            return Err(MonitorError::Config(format!(
                "endpoint '{}' has an empty target",
                name
            )));
        }
        if config.interval_secs == 0 {
            return Err(MonitorError::Config(format!(
                "endpoint '{}' interval must be positive",
                name
            )));
        }
        if config.timeout_secs == 0 {
            return Err(MonitorError::Config(format!(
                "endpoint '{}' timeout must be positive",
                name
            )));
        }

        match config.kind {
            EndpointKind::Http => {
                let url = Url::parse(target).map_err(|e| {
                    MonitorError::Config(format!("endpoint '{}' target is not a URL: {}", name, e))
                })?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(MonitorError::Config(format!(
                        "endpoint '{}' target must use http or https",
                        name
                    )));
                }
            }
            EndpointKind::Tcp => {
                let valid = target
                    .rsplit_once(':')
                    .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
                if !valid {
                    return Err(MonitorError::Config(format!(
                        "endpoint '{}' target must be host:port",
                        name
                    )));
                }
            }
        }

        let degraded_ms = config.degraded_threshold_ms.or(default_degraded_ms);
        if degraded_ms == Some(0) {
            return Err(MonitorError::Config(format!(
                "endpoint '{}' degraded threshold must be positive",
                name
            )));
        }

        Ok(Endpoint {
            name: name.to_string(),
            target: target.to_string(),
            kind: config.kind,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            degraded_after: degraded_ms.map(Duration::from_millis),
            labels: config.labels.clone(),
        })
    }

    /// All endpoints, ordered by name.
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.index.get(name).map(|&i| &self.endpoints[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
