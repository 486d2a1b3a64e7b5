//! Location source contract
//!
//! The platform side (GPS watch, OS background task) implements
//! `LocationSource`. Fixes flow back into the engine through a `FixSink`
//! handed over at subscription time.

use crate::domain::types::{LocationFix, TrackingMode};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Opaque subscription identifier issued by a `LocationSource`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SubscriptionHandle(pub u64);

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("subscription failed: {0}")]
    Subscription(String),
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("unknown subscription {0}")]
    UnknownHandle(SubscriptionHandle),
}

/// Persistent notice some platforms require while tracking in the background
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundNotice {
    pub title: String,
    pub body: String,
}

/// Background task registration details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundRegistration {
    pub task_id: String,
    pub notice: Option<ForegroundNotice>,
}

/// Parameters of a fix subscription
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    pub mode: TrackingMode,
    pub interval_ms: u64,
    pub min_displacement_m: f64,
    /// Present only for background mode
    pub background: Option<BackgroundRegistration>,
}

/// What happened to a delivered fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// Statuses recomputed; `transitions` events were emitted
    Processed { transitions: usize },
    /// Older than the last processed fix, dropped
    Stale,
    /// Unusable coordinates, dropped
    Invalid,
    /// No active session accepted it
    Inactive,
}

/// Receiver of fixes on the engine side
pub trait FixHandler: Send + Sync {
    fn handle_fix(&self, fix: LocationFix) -> FixOutcome;
}

/// Cloneable delivery endpoint passed to `LocationSource::subscribe`
#[derive(Clone)]
pub struct FixSink {
    handler: Arc<dyn FixHandler>,
}

impl FixSink {
    pub fn new(handler: Arc<dyn FixHandler>) -> Self {
        Self { handler }
    }

    /// Hand one fix to the engine; returns once it has been processed
    #[inline]
    pub fn deliver(&self, fix: LocationFix) -> FixOutcome {
        self.handler.handle_fix(fix)
    }
}

impl std::fmt::Debug for FixSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixSink").finish_non_exhaustive()
    }
}

/// Platform location provider
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// One on-demand fix (manual refresh)
    async fn current_fix(&self) -> Result<LocationFix, SourceError>;

    /// Whether permission for `mode` is already granted
    async fn has_permission(&self, _mode: TrackingMode) -> bool {
        false
    }

    /// Ask the user for permission; true when granted
    async fn request_permission(&self, mode: TrackingMode) -> bool;

    /// Start delivering fixes into `sink`
    async fn subscribe(
        &self,
        request: SubscriptionRequest,
        sink: FixSink,
    ) -> Result<SubscriptionHandle, SourceError>;

    /// Stop a subscription (foreground watch or background task)
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SourceError>;
}
