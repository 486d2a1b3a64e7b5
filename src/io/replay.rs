//! Replay location source - delivers recorded fixes
//!
//! Stands in for a platform GPS provider: fixes are read from a JSONL file
//! (one `{"latitude":..,"longitude":..,"timestamp":..}` per line) and pushed
//! into the subscribed sink, honoring the requested minimum displacement.

use crate::domain::geo;
use crate::domain::types::{LocationFix, TrackingMode};
use crate::io::location::{
    FixSink, LocationSource, SourceError, SubscriptionHandle, SubscriptionRequest,
};
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Read fixes from a JSONL file, skipping blank lines
pub fn load_fixes<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<LocationFix>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read fix file {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<LocationFix>(line)
                .with_context(|| format!("Invalid fix at {}:{}", path.display(), i + 1))
        })
        .collect()
}

/// Location source replaying a fixed list of fixes
pub struct ReplaySource {
    fixes: Arc<Vec<LocationFix>>,
    pace: Duration,
    grant_permission: AtomicBool,
    fail_subscribe: AtomicBool,
    last_delivered: Arc<Mutex<Option<LocationFix>>>,
    subscriptions: Mutex<FxHashMap<u64, watch::Sender<bool>>>,
    next_handle: AtomicU64,
    done_tx: Arc<watch::Sender<bool>>,
}

impl ReplaySource {
    pub fn new(fixes: Vec<LocationFix>, pace: Duration) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            fixes: Arc::new(fixes),
            pace,
            grant_permission: AtomicBool::new(true),
            fail_subscribe: AtomicBool::new(false),
            last_delivered: Arc::new(Mutex::new(None)),
            subscriptions: Mutex::new(FxHashMap::default()),
            next_handle: AtomicU64::new(1),
            done_tx: Arc::new(done_tx),
        }
    }

    /// Build from a JSONL fix file
    pub fn from_file<P: AsRef<Path>>(path: P, pace: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(load_fixes(path)?, pace))
    }

    /// Simulate the user granting or denying permission
    pub fn set_permission(&self, granted: bool) {
        self.grant_permission.store(granted, Ordering::Relaxed);
    }

    /// Simulate the platform refusing the watch or background task
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    /// Number of subscriptions still registered
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Resolves once a replay has delivered its last fix
    pub async fn finished(&self) {
        let mut rx = self.done_tx.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

#[async_trait]
impl LocationSource for ReplaySource {
    async fn current_fix(&self) -> Result<LocationFix, SourceError> {
        let last = *self.last_delivered.lock();
        last.or_else(|| self.fixes.first().copied())
            .ok_or_else(|| SourceError::Unavailable("no recorded fixes".to_string()))
    }

    async fn request_permission(&self, mode: TrackingMode) -> bool {
        let granted = self.grant_permission.load(Ordering::Relaxed);
        debug!(mode = %mode.as_str(), granted = %granted, "replay_permission_requested");
        granted
    }

    async fn subscribe(
        &self,
        request: SubscriptionRequest,
        sink: FixSink,
    ) -> Result<SubscriptionHandle, SourceError> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(SourceError::Subscription("replay configured to fail".to_string()));
        }

        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        self.done_tx.send_replace(false);
        self.subscriptions.lock().insert(handle.0, cancel_tx);

        let fixes = Arc::clone(&self.fixes);
        let last_delivered = Arc::clone(&self.last_delivered);
        let done_tx = Arc::clone(&self.done_tx);
        let pace = self.pace;
        let min_displacement_m = request.min_displacement_m;

        info!(
            handle = %handle,
            mode = %request.mode.as_str(),
            fixes = %fixes.len(),
            min_displacement_m = %min_displacement_m,
            "replay_started"
        );

        tokio::spawn(async move {
            let mut previous: Option<LocationFix> = None;
            let mut delivered = 0usize;

            for fix in fixes.iter().copied() {
                if *cancel_rx.borrow() {
                    break;
                }

                let moved = previous.map_or(f64::INFINITY, |p| {
                    geo::distance(p.coordinate(), fix.coordinate())
                });
                if moved < min_displacement_m {
                    debug!(timestamp = %fix.timestamp, moved_m = %moved, "replay_fix_below_displacement");
                    continue;
                }

                *last_delivered.lock() = Some(fix);
                previous = Some(fix);
                sink.deliver(fix);
                delivered += 1;

                if !pace.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(pace) => {}
                        _ = cancel_rx.changed() => break,
                    }
                } else {
                    tokio::task::yield_now().await;
                }
            }

            info!(handle = %handle, delivered = %delivered, "replay_finished");
            done_tx.send_replace(true);
        });

        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SourceError> {
        let cancel_tx =
            self.subscriptions.lock().remove(&handle.0).ok_or(SourceError::UnknownHandle(handle))?;
        cancel_tx.send_replace(true);
        debug!(handle = %handle, "replay_unsubscribed");
        Ok(())
    }
}
