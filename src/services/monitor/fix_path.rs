//! Per-fix processing for the monitor
//!
//! Runs synchronously and does bounded work: validate, recompute statuses,
//! diff, then enqueue notifications without waiting on them.

use super::MonitorInner;
use crate::domain::types::{LifecycleState, LocationFix, TransitionKind};
use crate::io::location::FixOutcome;
use crate::services::notification_worker::Dispatch;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

impl MonitorInner {
    /// Process one fix
    ///
    /// `session_id` binds the fix to the session that subscribed for it;
    /// `None` accepts whichever session is active.
    pub(crate) fn process_fix(&self, session_id: Option<Uuid>, fix: LocationFix) -> FixOutcome {
        let process_start = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // A subscription may fire before subscribe() has returned, so the
        // session's own sink is also accepted while Starting
        let active_id = match (state.lifecycle, state.session.as_ref()) {
            (LifecycleState::Active, Some(session)) => session.id,
            (LifecycleState::Starting, Some(session)) if session_id == Some(session.id) => {
                session.id
            }
            _ => {
                self.metrics.record_inactive_fix();
                debug!(
                    state = %state.lifecycle.as_str(),
                    timestamp = %fix.timestamp,
                    "fix_discarded_inactive"
                );
                return FixOutcome::Inactive;
            }
        };
        if session_id.is_some_and(|id| id != active_id) {
            self.metrics.record_inactive_fix();
            debug!(session_id = ?session_id, active_session_id = %active_id, "fix_discarded_foreign_session");
            return FixOutcome::Inactive;
        }

        if !fix.coordinate().is_valid() {
            self.metrics.record_invalid_fix();
            warn!(
                latitude = %fix.latitude,
                longitude = %fix.longitude,
                timestamp = %fix.timestamp,
                "fix_invalid_dropped"
            );
            return FixOutcome::Invalid;
        }

        if let Some(last) = state.last_fix_at {
            if fix.timestamp < last {
                self.metrics.record_stale_fix();
                warn!(timestamp = %fix.timestamp, last_timestamp = %last, "fix_stale_dropped");
                return FixOutcome::Stale;
            }
        }

        let zones = Arc::clone(&state.zones);
        let statuses = state.tracker.on_fix(&fix, &zones);
        let events = state.detector.detect(&statuses, &zones);
        state.last_fix_at = Some(fix.timestamp);

        // Emit while still holding the lock so events keep fix order and
        // nothing is published after stop() has taken the state
        for event in &events {
            match event.kind {
                TransitionKind::Entry => self.metrics.record_entry(),
                TransitionKind::Exit => self.metrics.record_exit(),
            }
            info!(
                session_id = %active_id,
                zone_id = %event.zone_id,
                kind = %event.kind.as_str(),
                at = %event.at,
                "zone_transition"
            );

            // No subscribers is fine
            let _ = self.events_tx.send(event.clone());

            let Some(zone) = zones.iter().find(|z| z.id == event.zone_id) else {
                continue;
            };
            let dispatch =
                Dispatch { zone: zone.clone(), event: event.clone(), enqueued_at: Instant::now() };
            match self.dispatch_tx.try_send(dispatch) {
                Ok(()) => {}
                Err(TrySendError::Full(d)) => {
                    self.metrics.record_notification_dropped();
                    warn!(zone_id = %d.zone.id, kind = %d.event.kind.as_str(), "notification_queue_full");
                }
                Err(TrySendError::Closed(d)) => {
                    self.metrics.record_notification_dropped();
                    warn!(zone_id = %d.zone.id, kind = %d.event.kind.as_str(), "notification_queue_closed");
                }
            }
        }
        drop(guard);

        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_fix_processed(latency_us);
        debug!(
            timestamp = %fix.timestamp,
            zones = %statuses.len(),
            transitions = %events.len(),
            latency_us = %latency_us,
            "fix_processed"
        );

        FixOutcome::Processed { transitions: events.len() }
    }
}
