//! Prometheus-style metrics.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::snapshot::MonitorSnapshot;
use crate::types::HealthStatus;

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

/// Metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Counter (monotonically increasing).
    Counter,
    /// Gauge (can go up and down).
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Process-wide monotonic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    ChecksTotal,
    CheckFailuresTotal,
    CheckTimeoutsTotal,
    ChecksSkippedTotal,
    AlertsFiringTotal,
    AlertsResolvedTotal,
    NotificationsTotal,
    AlertsInhibitedTotal,
    DeliveryFailuresTotal,
    SubscriberDropsTotal,
}

impl Counter {
    pub const ALL: [Counter; 10] = [
        Counter::ChecksTotal,
        Counter::CheckFailuresTotal,
        Counter::CheckTimeoutsTotal,
        Counter::ChecksSkippedTotal,
        Counter::AlertsFiringTotal,
        Counter::AlertsResolvedTotal,
        Counter::NotificationsTotal,
        Counter::AlertsInhibitedTotal,
        Counter::DeliveryFailuresTotal,
        Counter::SubscriberDropsTotal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Counter::ChecksTotal => "warden_checks_total",
            Counter::CheckFailuresTotal => "warden_check_failures_total",
            Counter::CheckTimeoutsTotal => "warden_check_timeouts_total",
            Counter::ChecksSkippedTotal => "warden_checks_skipped_total",
            Counter::AlertsFiringTotal => "warden_alerts_firing_total",
            Counter::AlertsResolvedTotal => "warden_alerts_resolved_total",
            Counter::NotificationsTotal => "warden_notifications_total",
            Counter::AlertsInhibitedTotal => "warden_alerts_inhibited_total",
            Counter::DeliveryFailuresTotal => "warden_delivery_failures_total",
            Counter::SubscriberDropsTotal => "warden_subscriber_drops_total",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Counter::ChecksTotal => "Probes completed",
            Counter::CheckFailuresTotal => "Probes that did not report healthy",
            Counter::CheckTimeoutsTotal => "Probes abandoned after their timeout",
            Counter::ChecksSkippedTotal => "Scheduled ticks skipped because a probe was in flight",
            Counter::AlertsFiringTotal => "Firing alerts emitted by status transitions",
            Counter::AlertsResolvedTotal => "Resolved alerts emitted by status transitions",
            Counter::NotificationsTotal => "Group flushes handed to fan-out",
            Counter::AlertsInhibitedTotal => "Alerts left out of a flush by an inhibit rule",
            Counter::DeliveryFailuresTotal => "Receiver deliveries that failed or timed out",
            Counter::SubscriberDropsTotal => "Notifications not queued to a full or closed subscriber",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Counters shared by every monitor component.
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    counters: [AtomicU64; Counter::ALL.len()],
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, value: u64) {
        self.counters[counter.index()].fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Export counters plus gauges derived from `snapshot` in Prometheus text
    /// format. Per-endpoint series are only written when `detail` is set.
    pub fn render(&self, snapshot: &MonitorSnapshot, detail: bool) -> String {
        let mut out = String::new();

        write_header(&mut out, "warden_up", "Whether the monitor is running", MetricType::Gauge);
        out.push_str("warden_up 1\n");

        write_header(
            &mut out,
            "warden_ready",
            "Whether every endpoint has reported at least once",
            MetricType::Gauge,
        );
        let _ = writeln!(out, "warden_ready {}", u8::from(snapshot.ready));

        for counter in Counter::ALL {
            write_header(&mut out, counter.name(), counter.help(), MetricType::Counter);
            let _ = writeln!(out, "{} {}", counter.name(), self.get(counter));
        }

        let statuses = [
            HealthStatus::Unknown,
            HealthStatus::Healthy,
            HealthStatus::Degraded,
            HealthStatus::Unhealthy,
        ];
        write_header(
            &mut out,
            "warden_endpoints",
            "Monitored endpoints by current status",
            MetricType::Gauge,
        );
        for status in statuses {
            let count = snapshot.status_counts.get(&status).copied().unwrap_or(0);
            let _ = writeln!(out, "warden_endpoints{{status=\"{}\"}} {}", status, count);
        }

        if detail {
            write_endpoint_series(&mut out, snapshot, &statuses);
        }

        write_header(&mut out, "warden_alert_groups", "Active alert groups", MetricType::Gauge);
        let _ = writeln!(out, "warden_alert_groups {}", snapshot.alerts.groups);

        write_header(
            &mut out,
            "warden_alerts_firing",
            "Firing alerts by severity",
            MetricType::Gauge,
        );
        for (severity, count) in &snapshot.alerts.firing_by_severity {
            let _ = writeln!(
                out,
                "warden_alerts_firing{{severity=\"{}\"}} {}",
                escape(severity),
                count
            );
        }

        write_header(
            &mut out,
            "warden_alerts_inhibited",
            "Firing alerts currently suppressed",
            MetricType::Gauge,
        );
        let _ = writeln!(out, "warden_alerts_inhibited {}", snapshot.alerts.inhibited);

        write_header(
            &mut out,
            "warden_subscribers",
            "Connected live subscribers",
            MetricType::Gauge,
        );
        let _ = writeln!(out, "warden_subscribers {}", snapshot.subscribers);

        out
    }
}

fn write_endpoint_series(out: &mut String, snapshot: &MonitorSnapshot, statuses: &[HealthStatus]) {
    write_header(
        out,
        "warden_endpoint_status",
        "Current endpoint status, one series per status",
        MetricType::Gauge,
    );
    for endpoint in &snapshot.endpoints {
        for status in statuses.iter().copied() {
            let _ = writeln!(
                out,
                "warden_endpoint_status{{endpoint=\"{}\",status=\"{}\"}} {}",
                escape(&endpoint.name),
                status,
                u8::from(endpoint.status == status)
            );
        }
    }

    write_header(
        out,
        "warden_endpoint_consecutive_failures",
        "Current failure streak per endpoint",
        MetricType::Gauge,
    );
    for endpoint in &snapshot.endpoints {
        let _ = writeln!(
            out,
            "warden_endpoint_consecutive_failures{{endpoint=\"{}\"}} {}",
            escape(&endpoint.name),
            endpoint.consecutive_failures
        );
    }

    write_header(
        out,
        "warden_endpoint_last_duration_ms",
        "Duration of the latest probe per endpoint",
        MetricType::Gauge,
    );
    for endpoint in &snapshot.endpoints {
        if let Some(check) = &endpoint.last_check {
            let _ = writeln!(
                out,
                "warden_endpoint_last_duration_ms{{endpoint=\"{}\"}} {}",
                escape(&endpoint.name),
                check.duration_ms
            );
        }
    }
}

fn write_header(out: &mut String, name: &str, help: &str, metric_type: MetricType) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, metric_type.as_str());
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
