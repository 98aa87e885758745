use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::AlertRouter;
use crate::fanout::FanOut;
use crate::snapshot::RouterStats;
use crate::types::AlertEvent;

/// Owns the router inside one task so events are applied in arrival order.
pub struct RouterDriver {
    router: AlertRouter,
    events: mpsc::Receiver<AlertEvent>,
    fanout: Arc<FanOut>,
    stats: watch::Sender<RouterStats>,
    shutdown: CancellationToken,
}

impl RouterDriver {
    pub fn new(
        router: AlertRouter,
        events: mpsc::Receiver<AlertEvent>,
        fanout: Arc<FanOut>,
        stats: watch::Sender<RouterStats>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            router,
            events,
            fanout,
            stats,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("Alert router started");

        loop {
            let deadline = self.router.next_deadline();
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.router.process(event, Instant::now()),
                    None => break,
                },
                _ = sleep_until(deadline) => {}
            }
            self.flush(Instant::now());
        }

        // Events already queued by the executor still count.
        while let Ok(event) = self.events.try_recv() {
            self.router.process(event, Instant::now());
        }
        self.flush(Instant::now());
        self.router.clear();
        let _ = self.stats.send(self.router.stats());

        info!("Alert router stopped");
    }

    fn flush(&mut self, now: Instant) {
        for notification in self.router.flush_due(now) {
            debug!(
                "Flushing group {} ({} firing, {} resolved)",
                notification.group_key,
                notification.firing.len(),
                notification.resolved.len()
            );
            self.fanout.dispatch(notification);
        }
        let stats = self.router.stats();
        self.stats.send_if_modified(|current| {
            if *current == stats {
                false
            } else {
                *current = stats;
                true
            }
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
