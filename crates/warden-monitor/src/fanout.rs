//! Notification fan-out.
//!
//! Every flushed group goes to the configured [`AlertSink`] on a tracked,
//! semaphore-bounded task, and to each live subscriber of the receiver's
//! group through a bounded queue that is never waited on.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use warden_config::FanOutConfig;

use crate::error::MonitorError;
use crate::metrics::{Counter, MonitorMetrics};
use crate::registry::EndpointRegistry;
use crate::router::Notification;
use crate::sink::AlertSink;
use crate::snapshot::{EndpointSnapshot, MonitorSnapshot, RouterStats};
use crate::tracker::StatusTracker;

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;

struct Subscriber {
    queue: mpsc::Sender<Notification>,
    groups: HashSet<String>,
}

pub struct FanOut {
    sink: Arc<dyn AlertSink>,
    registry: Arc<EndpointRegistry>,
    tracker: Arc<StatusTracker>,
    metrics: Arc<MonitorMetrics>,
    router_stats: watch::Receiver<RouterStats>,
    subscribers: DashMap<String, Subscriber>,
    deliveries: TaskTracker,
    permits: Arc<Semaphore>,
    delivery_timeout: Duration,
    closed: AtomicBool,
}

impl FanOut {
    pub fn new(
        config: &FanOutConfig,
        sink: Arc<dyn AlertSink>,
        registry: Arc<EndpointRegistry>,
        tracker: Arc<StatusTracker>,
        metrics: Arc<MonitorMetrics>,
        router_stats: watch::Receiver<RouterStats>,
    ) -> Result<Self, MonitorError> {
        if config.max_concurrent_deliveries == 0 || config.delivery_timeout_secs == 0 {
            return Err(MonitorError::Config(
                "fan-out concurrency and delivery timeout must be positive".to_string(),
            ));
        }

        Ok(Self {
            sink,
            registry,
            tracker,
            metrics,
            router_stats,
            subscribers: DashMap::new(),
            deliveries: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_deliveries)),
            delivery_timeout: Duration::from_secs(config.delivery_timeout_secs),
            closed: AtomicBool::new(false),
        })
    }

    /// Register a live connection's outbound queue. Re-registering an id
    /// replaces the old queue and drops its subscriptions.
    pub fn register(
        &self,
        id: impl Into<String>,
        queue: mpsc::Sender<Notification>,
    ) -> Result<(), MonitorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MonitorError::NotRunning);
        }
        let id = id.into();
        let subscriber = Subscriber {
            queue,
            groups: HashSet::new(),
        };
        if self.subscribers.insert(id.clone(), subscriber).is_some() {
            warn!("Subscriber {} registered twice, replacing", id);
        } else {
            debug!("Subscriber {} registered", id);
        }
        Ok(())
    }

    /// Forget a subscriber and all of its memberships.
    pub fn disconnect(&self, id: &str) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            debug!("Subscriber {} disconnected", id);
        }
        removed
    }

    /// Join a group. Returns false if already a member.
    pub fn subscribe(&self, id: &str, group: &str) -> Result<bool, MonitorError> {
        let mut subscriber = self
            .subscribers
            .get_mut(id)
            .ok_or_else(|| MonitorError::UnknownSubscriber(id.to_string()))?;
        Ok(subscriber.groups.insert(group.to_string()))
    }

    /// Leave a group. Returns false if not a member.
    pub fn unsubscribe(&self, id: &str, group: &str) -> Result<bool, MonitorError> {
        let mut subscriber = self
            .subscribers
            .get_mut(id)
            .ok_or_else(|| MonitorError::UnknownSubscriber(id.to_string()))?;
        Ok(subscriber.groups.remove(group))
    }

    /// Groups a subscriber belongs to, sorted.
    pub fn subscriptions(&self, id: &str) -> Option<Vec<String>> {
        self.subscribers.get(id).map(|s| {
            let mut groups: Vec<String> = s.groups.iter().cloned().collect();
            groups.sort();
            groups
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Hand a notification to the receiver sink and to every subscriber of
    /// the receiver's group. Never waits.
    pub fn dispatch(&self, notification: Notification) {
        self.publish(&notification);

        if self.closed.load(Ordering::SeqCst) {
            warn!(
                "Fan-out closed, not delivering group {} to {}",
                notification.group_key, notification.receiver
            );
            return;
        }

        let sink = Arc::clone(&self.sink);
        let permits = Arc::clone(&self.permits);
        let metrics = Arc::clone(&self.metrics);
        let timeout = self.delivery_timeout;

        self.deliveries.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let receiver = notification.receiver.as_str();
            match tokio::time::timeout(timeout, sink.deliver(receiver, &notification)).await {
                Ok(Ok(())) => debug!("Delivered group {} to {}", notification.group_key, receiver),
                Ok(Err(e)) => {
                    metrics.inc(Counter::DeliveryFailuresTotal);
                    warn!("Delivery of group {} failed: {}", notification.group_key, e);
                }
                Err(_) => {
                    metrics.inc(Counter::DeliveryFailuresTotal);
                    warn!(
                        "Delivery of group {} to {} timed out after {:?}",
                        notification.group_key, receiver, timeout
                    );
                }
            }
        });
    }

    fn publish(&self, notification: &Notification) {
        for entry in self.subscribers.iter() {
            if !entry.groups.contains(&notification.receiver) {
                continue;
            }
            match entry.queue.try_send(notification.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.metrics.inc(Counter::SubscriberDropsTotal);
                    warn!(
                        "Subscriber {} queue full, dropping group {}",
                        entry.key(),
                        notification.group_key
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    self.metrics.inc(Counter::SubscriberDropsTotal);
                    debug!("Subscriber {} queue closed", entry.key());
                }
            }
        }
    }

    /// Current endpoint states plus the router's latest statistics.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let endpoints: Vec<EndpointSnapshot> = self
            .tracker
            .states()
            .into_iter()
            .map(|(name, state)| EndpointSnapshot {
                labels: self
                    .registry
                    .get(&name)
                    .map(|e| e.labels.clone())
                    .unwrap_or_default(),
                name,
                status: state.current_status,
                consecutive_failures: state.consecutive_failures,
                consecutive_successes: state.consecutive_successes,
                last_transition_at: state.last_transition_at,
                last_check: state.last_result,
                checks_total: state.checks_total,
                failures_total: state.failures_total,
            })
            .collect();

        let mut status_counts = BTreeMap::new();
        for endpoint in &endpoints {
            *status_counts.entry(endpoint.status).or_insert(0) += 1;
        }

        MonitorSnapshot {
            generated_at: Utc::now(),
            ready: self.tracker.is_ready(),
            endpoints,
            status_counts,
            alerts: self.router_stats.borrow().clone(),
            subscribers: self.subscribers.len(),
        }
    }

    /// Drop every subscriber queue and wait for outstanding deliveries.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = self.subscribers.len();
        self.subscribers.clear();
        self.deliveries.close();
        self.deliveries.wait().await;
        info!("Fan-out closed, {} subscribers disconnected", dropped);
    }
}
