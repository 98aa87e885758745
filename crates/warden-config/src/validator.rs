//! Configuration validation.

use std::collections::HashSet;

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::{Config, DEFAULT_RECEIVER, InhibitRuleConfig, RouteConfig};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn collected errors into a single [`ConfigError::Invalid`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ConfigError::Invalid(
                self.errors.iter().map(ToString::to_string).collect(),
            ))
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_runtime(config, &mut result);
        Self::validate_api(config, &mut result);
        Self::validate_endpoints(config, &mut result);
        Self::validate_alerting(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }

        if config.daemon.shutdown_grace_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "daemon.shutdown_grace_secs",
                "grace period is 0, in-flight probes will be cancelled immediately on shutdown",
            ));
        }
    }

    fn validate_runtime(config: &Config, result: &mut ValidationResult) {
        let positive = [
            (
                "executor.max_concurrent_probes",
                config.executor.max_concurrent_probes as u64,
            ),
            (
                "tracker.failure_threshold",
                u64::from(config.tracker.failure_threshold),
            ),
            (
                "tracker.recovery_threshold",
                u64::from(config.tracker.recovery_threshold),
            ),
            ("fanout.subscriber_buffer", config.fanout.subscriber_buffer as u64),
            (
                "fanout.max_concurrent_deliveries",
                config.fanout.max_concurrent_deliveries as u64,
            ),
            ("fanout.delivery_timeout_secs", config.fanout.delivery_timeout_secs),
        ];
        for (path, value) in positive {
            if value == 0 {
                result.add_error(ValidationError::new(path, "must be greater than 0"));
            }
        }

        if config.executor.degraded_threshold_ms == Some(0) {
            result.add_error(ValidationError::new(
                "executor.degraded_threshold_ms",
                "must be greater than 0",
            ));
        }
    }

    fn validate_api(config: &Config, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for (i, token) in config.api.tokens.iter().enumerate() {
            let path = format!("api.tokens[{}]", i);
            if token.token.is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.token", path),
                    "token cannot be empty",
                ));
            } else if !seen.insert(token.token.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.token", path),
                    "token is declared more than once",
                ));
            }
            if token.capabilities.is_empty() {
                result.add_warning(ValidationWarning::new(
                    format!("{}.capabilities", path),
                    "token grants no capabilities",
                ));
            }
        }
    }

    fn validate_endpoints(config: &Config, result: &mut ValidationResult) {
        if config.endpoints.is_empty() {
            result.add_warning(ValidationWarning::new(
                "endpoints",
                "no endpoints configured, nothing will be monitored",
            ));
        }

        let mut names = HashSet::new();
        for (i, endpoint) in config.endpoints.iter().enumerate() {
            let path = format!("endpoints[{}]", i);

            if endpoint.name.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    "name cannot be empty",
                ));
            } else if !names.insert(endpoint.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    format!("duplicate endpoint name '{}'", endpoint.name),
                ));
            }

            if endpoint.target.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.target", path),
                    "target cannot be empty",
                ));
            }

            if endpoint.interval_secs == 0 {
                result.add_error(ValidationError::new(
                    format!("{}.interval_secs", path),
                    "must be greater than 0",
                ));
            }

            if endpoint.timeout_secs == 0 {
                result.add_error(ValidationError::new(
                    format!("{}.timeout_secs", path),
                    "must be greater than 0",
                ));
            } else if endpoint.timeout_secs > endpoint.interval_secs {
                result.add_warning(ValidationWarning::new(
                    format!("{}.timeout_secs", path),
                    "timeout exceeds interval, ticks will be skipped while a probe is running",
                ));
            }

            if endpoint.degraded_threshold_ms == Some(0) {
                result.add_error(ValidationError::new(
                    format!("{}.degraded_threshold_ms", path),
                    "must be greater than 0",
                ));
            }
        }
    }

    fn validate_alerting(config: &Config, result: &mut ValidationResult) {
        let alerting = &config.alerting;

        let timings = [
            ("alerting.group_wait_secs", alerting.group_wait_secs),
            ("alerting.group_interval_secs", alerting.group_interval_secs),
            ("alerting.repeat_interval_secs", alerting.repeat_interval_secs),
        ];
        for (path, value) in timings {
            if value == 0 {
                result.add_error(ValidationError::new(path, "must be greater than 0"));
            }
        }

        let mut receivers = HashSet::new();
        for (i, receiver) in alerting.receivers.iter().enumerate() {
            if receiver.name.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("alerting.receivers[{}].name", i),
                    "receiver name cannot be empty",
                ));
            } else if !receivers.insert(receiver.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("alerting.receivers[{}].name", i),
                    format!("duplicate receiver '{}'", receiver.name),
                ));
            }
        }

        let mut used = HashSet::new();
        if alerting.route.receiver.is_none() {
            used.insert(DEFAULT_RECEIVER.to_string());
            if !receivers.contains(DEFAULT_RECEIVER) {
                result.add_error(ValidationError::new(
                    "alerting.route.receiver",
                    format!(
                        "root route has no receiver and '{}' is not declared",
                        DEFAULT_RECEIVER
                    ),
                ));
            }
        }
        Self::validate_route(&alerting.route, "alerting.route", &receivers, &mut used, result);

        for name in &receivers {
            if !used.contains(*name) {
                result.add_warning(ValidationWarning::new(
                    "alerting.receivers",
                    format!("receiver '{}' is not referenced by any route", name),
                ));
            }
        }

        for (i, rule) in alerting.inhibit_rules.iter().enumerate() {
            Self::validate_inhibit_rule(rule, &format!("alerting.inhibit_rules[{}]", i), result);
        }
    }

    fn validate_route(
        route: &RouteConfig,
        path: &str,
        receivers: &HashSet<&str>,
        used: &mut HashSet<String>,
        result: &mut ValidationResult,
    ) {
        if let Some(receiver) = &route.receiver {
            used.insert(receiver.clone());
            if !receivers.contains(receiver.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.receiver", path),
                    format!("unknown receiver '{}'", receiver),
                ));
            }
        }

        let timings = [
            ("group_wait_secs", route.group_wait_secs),
            ("group_interval_secs", route.group_interval_secs),
            ("repeat_interval_secs", route.repeat_interval_secs),
        ];
        for (field, value) in timings {
            if value == Some(0) {
                result.add_error(ValidationError::new(
                    format!("{}.{}", path, field),
                    "must be greater than 0",
                ));
            }
        }

        for (label, pattern) in &route.match_re {
            if let Err(e) = Regex::new(pattern) {
                result.add_error(ValidationError::new(
                    format!("{}.match_re.{}", path, label),
                    format!("invalid regex: {}", e),
                ));
            }
        }

        for (i, child) in route.routes.iter().enumerate() {
            Self::validate_route(child, &format!("{}.routes[{}]", path, i), receivers, used, result);
        }
    }

    fn validate_inhibit_rule(rule: &InhibitRuleConfig, path: &str, result: &mut ValidationResult) {
        if rule.source_match.is_empty() && rule.source_match_re.is_empty() {
            result.add_error(ValidationError::new(
                format!("{}.source_match", path),
                "inhibit rule needs at least one source matcher",
            ));
        }
        if rule.target_match.is_empty() && rule.target_match_re.is_empty() {
            result.add_error(ValidationError::new(
                format!("{}.target_match", path),
                "inhibit rule needs at least one target matcher",
            ));
        }
        for (label, pattern) in rule.source_match_re.iter().chain(rule.target_match_re.iter()) {
            if let Err(e) = Regex::new(pattern) {
                result.add_error(ValidationError::new(
                    format!("{}.match_re.{}", path, label),
                    format!("invalid regex: {}", e),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
