//! Application state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use warden_config::ApiConfig;
use warden_monitor::{CapabilitySet, Monitor};

use crate::error::ApiError;

/// Application state shared across handlers.
pub struct AppState {
    pub monitor: Arc<Monitor>,
    tokens: HashMap<String, CapabilitySet>,
    start_time: Instant,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>, config: &ApiConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| (t.token.clone(), t.capabilities.iter().copied().collect()))
            .collect();
        Self {
            monitor,
            tokens,
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Capabilities for a presented token. No token means anonymous, an
    /// unknown token is rejected.
    pub fn capabilities_for(&self, token: Option<&str>) -> Result<CapabilitySet, ApiError> {
        match token {
            None => Ok(CapabilitySet::none()),
            Some(token) => self.tokens.get(token).cloned().ok_or(ApiError::Unauthorized),
        }
    }
}
