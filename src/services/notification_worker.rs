//! Notification worker - dispatches transition alerts off the fix path
//!
//! The fix path only enqueues via `try_send`; this worker awaits the bridge.
//! A failed notification is logged and counted, never fed back into
//! containment tracking. Each call runs in its own task so a panicking bridge
//! costs one notification, not the worker.

use crate::domain::types::{TransitionEvent, Zone};
use crate::infra::metrics::Metrics;
use crate::io::notifier::NotificationBridge;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A transition waiting for delivery
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Zone as configured when the transition fired
    pub zone: Zone,
    pub event: TransitionEvent,
    /// When the dispatch was enqueued (for queue delay measurement)
    pub enqueued_at: Instant,
}

/// Worker that drains the dispatch queue
pub struct NotificationWorker {
    notifier: Arc<dyn NotificationBridge>,
    dispatch_rx: mpsc::Receiver<Dispatch>,
    metrics: Arc<Metrics>,
}

impl NotificationWorker {
    pub fn new(
        notifier: Arc<dyn NotificationBridge>,
        dispatch_rx: mpsc::Receiver<Dispatch>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { notifier, dispatch_rx, metrics }
    }

    /// Run the worker, processing dispatches until every sender is dropped
    pub async fn run(mut self) {
        info!("notification_worker_started");

        while let Some(dispatch) = self.dispatch_rx.recv().await {
            let queue_delay_us = dispatch.enqueued_at.elapsed().as_micros() as u64;

            let notifier = Arc::clone(&self.notifier);
            let zone = dispatch.zone.clone();
            let kind = dispatch.event.kind;
            let delivery = tokio::spawn(async move { notifier.notify(&zone, kind).await });

            match delivery.await {
                Ok(Ok(())) => {
                    self.metrics.record_notification_sent();
                    debug!(
                        zone_id = %dispatch.zone.id,
                        kind = %dispatch.event.kind.as_str(),
                        queue_delay_us = %queue_delay_us,
                        "notification_dispatched"
                    );
                }
                Ok(Err(e)) => {
                    self.metrics.record_notification_failed();
                    warn!(
                        zone_id = %dispatch.zone.id,
                        kind = %dispatch.event.kind.as_str(),
                        error = %e,
                        "notification_dispatch_failed"
                    );
                }
                Err(e) => {
                    self.metrics.record_notification_failed();
                    error!(
                        zone_id = %dispatch.zone.id,
                        kind = %dispatch.event.kind.as_str(),
                        error = %e,
                        "notification_dispatch_panicked"
                    );
                }
            }
        }

        info!("notification_worker_stopped");
    }
}

/// Create a dispatch channel and worker
///
/// Returns the sender (for the monitor) and the worker (to be spawned)
pub fn create_notification_worker(
    notifier: Arc<dyn NotificationBridge>,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (mpsc::Sender<Dispatch>, NotificationWorker) {
    let (dispatch_tx, dispatch_rx) = mpsc::channel(buffer_size.max(1));
    let worker = NotificationWorker::new(notifier, dispatch_rx, metrics);
    (dispatch_tx, worker)
}
