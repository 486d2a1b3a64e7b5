//! Tracking lifecycle and fix routing
//!
//! `ZoneMonitor` owns one tracking session at a time and drives:
//! - Lifecycle: Idle -> Starting -> Active -> Stopping -> Idle
//! - Permission and subscription with the `LocationSource`
//! - Per-fix status computation and transition detection
//! - Hand-off of transitions to the notification worker and event subscribers
//!
//! All mutable state sits behind one synchronous mutex that is never held
//! across an await. A fix is processed entirely under that lock, so it either
//! completes before `stop()` flips the state or is discarded.

mod fix_path;

use crate::domain::types::{LifecycleState, LocationFix, TrackingMode, TransitionEvent, Zone};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::location::{
    BackgroundRegistration, FixHandler, FixOutcome, FixSink, ForegroundNotice, LocationSource,
    SourceError, SubscriptionHandle, SubscriptionRequest,
};
use crate::services::notification_worker::Dispatch;
use crate::services::status_tracker::{StatusSnapshot, ZoneStatusTracker};
use crate::services::transition_detector::TransitionDetector;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the transition broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no active tracking session")]
    NotActive,
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// One monitoring period
#[derive(Debug, Clone)]
pub(crate) struct TrackingSession {
    pub(crate) id: Uuid,
    pub(crate) mode: TrackingMode,
    pub(crate) handle: Option<SubscriptionHandle>,
}

/// Everything a fix may read or replace
pub(crate) struct MonitorState {
    pub(crate) lifecycle: LifecycleState,
    pub(crate) session: Option<TrackingSession>,
    /// Current zone set, swapped wholesale by `set_zones`
    pub(crate) zones: Arc<[Zone]>,
    pub(crate) tracker: ZoneStatusTracker,
    pub(crate) detector: TransitionDetector,
    /// Timestamp of the last processed fix in this session
    pub(crate) last_fix_at: Option<u64>,
}

pub(crate) struct MonitorInner {
    pub(crate) config: Config,
    pub(crate) source: Arc<dyn LocationSource>,
    pub(crate) dispatch_tx: mpsc::Sender<Dispatch>,
    pub(crate) events_tx: broadcast::Sender<TransitionEvent>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) state: Mutex<MonitorState>,
}

/// Zone monitoring engine
#[derive(Clone)]
pub struct ZoneMonitor {
    inner: Arc<MonitorInner>,
}

/// Routes subscription fixes to the session that created the subscription
struct SessionFixHandler {
    inner: Weak<MonitorInner>,
    session_id: Uuid,
}

impl FixHandler for SessionFixHandler {
    fn handle_fix(&self, fix: LocationFix) -> FixOutcome {
        match self.inner.upgrade() {
            Some(inner) => inner.process_fix(Some(self.session_id), fix),
            None => FixOutcome::Inactive,
        }
    }
}

/// Returns a pending start to Idle if `start()` is abandoned before Active
struct StartGuard<'a> {
    monitor: &'a ZoneMonitor,
    session_id: Uuid,
    armed: bool,
}

impl StartGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.monitor.abort_start(self.session_id);
        }
    }
}

/// Completes the Stopping -> Idle transition even if `stop()` is abandoned
/// while the source is deregistering
struct StopGuard<'a> {
    monitor: &'a ZoneMonitor,
    session_id: Option<Uuid>,
    completed: bool,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.monitor.inner.state.lock();
            state.lifecycle = LifecycleState::Idle;
            state.session = None;
        }
        if self.completed {
            info!(session_id = ?self.session_id, "monitor_stopped");
        } else {
            warn!(session_id = ?self.session_id, "monitor_stop_cancelled");
        }
    }
}

impl ZoneMonitor {
    /// Create a monitor with the given configuration and collaborators
    pub fn new(
        config: Config,
        source: Arc<dyn LocationSource>,
        dispatch_tx: mpsc::Sender<Dispatch>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = MonitorState {
            lifecycle: LifecycleState::Idle,
            session: None,
            zones: Arc::from(Vec::new()),
            tracker: ZoneStatusTracker::with_metrics(metrics.clone()),
            detector: TransitionDetector::new(),
            last_fix_at: None,
        };
        Self {
            inner: Arc::new(MonitorInner {
                config,
                source,
                dispatch_tx,
                events_tx,
                metrics,
                state: Mutex::new(state),
            }),
        }
    }

    /// Begin monitoring `zones` in `mode`
    ///
    /// Returns false when a session already exists, permission is denied or
    /// the platform refuses the subscription. The monitor is Idle again in
    /// the latter two cases, and also when the returned future is dropped
    /// before the session became Active.
    pub async fn start(&self, mode: TrackingMode, zones: Vec<Zone>) -> bool {
        let session_id = {
            let mut state = self.inner.state.lock();
            if state.lifecycle != LifecycleState::Idle {
                warn!(
                    state = %state.lifecycle.as_str(),
                    requested_mode = %mode.as_str(),
                    "monitor_start_rejected"
                );
                return false;
            }

            let id = Uuid::now_v7();
            state.lifecycle = LifecycleState::Starting;
            state.session = Some(TrackingSession { id, mode, handle: None });
            state.zones = Arc::from(zones);
            state.tracker.reset();
            state.detector.reset();
            state.last_fix_at = None;

            info!(
                session_id = %id,
                mode = %mode.as_str(),
                zones = %state.zones.len(),
                "monitor_starting"
            );
            id
        };

        let guard = StartGuard { monitor: self, session_id, armed: true };

        let source = &self.inner.source;
        if !source.has_permission(mode).await && !source.request_permission(mode).await {
            warn!(session_id = %session_id, mode = %mode.as_str(), "location_permission_denied");
            return false;
        }

        let sink = FixSink::new(Arc::new(SessionFixHandler {
            inner: Arc::downgrade(&self.inner),
            session_id,
        }));
        let handle = match source.subscribe(self.subscription_request(mode), sink).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    mode = %mode.as_str(),
                    error = %e,
                    "location_subscription_failed"
                );
                return false;
            }
        };

        {
            let mut state = self.inner.state.lock();
            state.lifecycle = LifecycleState::Active;
            if let Some(session) = state.session.as_mut() {
                session.handle = Some(handle);
            }
        }
        guard.disarm();
        info!(session_id = %session_id, mode = %mode.as_str(), handle = %handle, "monitor_started");

        if self.inner.config.initial_fix() {
            match self.refresh().await {
                Ok(outcome) => debug!(session_id = %session_id, outcome = ?outcome, "initial_fix"),
                Err(e) => warn!(session_id = %session_id, error = %e, "initial_fix_failed"),
            }
        }

        true
    }

    /// Stop monitoring
    ///
    /// Idle is a successful no-op. Returns false only while a start or stop
    /// is still in flight. A dropped stop future still ends the session.
    pub async fn stop(&self) -> bool {
        let (session_id, handle) = {
            let mut state = self.inner.state.lock();
            match state.lifecycle {
                LifecycleState::Idle => {
                    debug!("monitor_stop_noop");
                    return true;
                }
                LifecycleState::Starting | LifecycleState::Stopping => {
                    warn!(state = %state.lifecycle.as_str(), "monitor_stop_rejected");
                    return false;
                }
                LifecycleState::Active => {}
            }

            state.lifecycle = LifecycleState::Stopping;
            let session = state.session.as_ref();
            (session.map(|s| s.id), session.and_then(|s| s.handle))
        };
        let mut guard = StopGuard { monitor: self, session_id, completed: false };

        if let Some(handle) = handle {
            // Deregistration failure still ends the session; fixes are gated on state
            if let Err(e) = self.inner.source.unsubscribe(handle).await {
                warn!(handle = %handle, error = %e, "location_unsubscribe_failed");
            }
        }

        guard.completed = true;
        drop(guard);
        true
    }

    /// Pull one fix on demand and process it
    pub async fn refresh(&self) -> Result<FixOutcome, EngineError> {
        let session_id = self.active_session_id().ok_or(EngineError::NotActive)?;
        let fix = self.inner.source.current_fix().await?;
        Ok(self.inner.process_fix(Some(session_id), fix))
    }

    /// Process a fix for whichever session is active
    ///
    /// Entry point for platform adapters that are not bound to a subscription.
    pub fn on_fix(&self, fix: LocationFix) -> FixOutcome {
        self.inner.process_fix(None, fix)
    }

    /// Replace the zone set; takes effect from the next fix
    pub fn set_zones(&self, zones: Vec<Zone>) {
        let mut state = self.inner.state.lock();
        state.zones = Arc::from(zones);
        info!(zones = %state.zones.len(), "zones_replaced");
    }

    /// Last computed status snapshot
    pub fn statuses(&self) -> StatusSnapshot {
        self.inner.state.lock().tracker.current_statuses()
    }

    /// Ids of zones the user is currently inside
    pub fn active_zone_ids(&self) -> Vec<String> {
        self.statuses().iter().filter(|s| s.is_inside).map(|s| s.zone_id.clone()).collect()
    }

    /// Current zone set
    pub fn zones(&self) -> Arc<[Zone]> {
        Arc::clone(&self.inner.state.lock().zones)
    }

    /// Subscribe to transition events as they occur
    pub fn subscribe_events(&self) -> broadcast::Receiver<TransitionEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.state.lock().lifecycle
    }

    /// Mode of the current session, if any
    pub fn mode(&self) -> Option<TrackingMode> {
        self.inner.state.lock().session.as_ref().map(|s| s.mode)
    }

    /// Id of the current session, if any
    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.state.lock().session.as_ref().map(|s| s.id)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    fn active_session_id(&self) -> Option<Uuid> {
        let state = self.inner.state.lock();
        match (state.lifecycle, state.session.as_ref()) {
            (LifecycleState::Active, Some(session)) => Some(session.id),
            _ => None,
        }
    }

    /// Return to Idle after a failed start, if nothing else took over
    fn abort_start(&self, session_id: Uuid) {
        let mut state = self.inner.state.lock();
        if state.session.as_ref().is_some_and(|s| s.id == session_id) {
            state.lifecycle = LifecycleState::Idle;
            state.session = None;
        }
        info!(session_id = %session_id, "monitor_start_aborted");
    }

    fn subscription_request(&self, mode: TrackingMode) -> SubscriptionRequest {
        let config = &self.inner.config;
        match mode {
            TrackingMode::Foreground => SubscriptionRequest {
                mode,
                interval_ms: config.foreground_interval_ms(),
                min_displacement_m: config.min_displacement_m(),
                background: None,
            },
            TrackingMode::Background => SubscriptionRequest {
                mode,
                interval_ms: config.background_interval_ms(),
                min_displacement_m: config.min_displacement_m(),
                background: Some(BackgroundRegistration {
                    task_id: config.background_task_id().to_string(),
                    notice: Some(ForegroundNotice {
                        title: config.notice_title().to_string(),
                        body: config.notice_body().to_string(),
                    }),
                }),
            },
        }
    }
}

impl FixHandler for ZoneMonitor {
    fn handle_fix(&self, fix: LocationFix) -> FixOutcome {
        self.on_fix(fix)
    }
}
