//! IO modules - platform interfaces
//!
//! This module contains all external IO operations:
//! - `location` - Location source contract and fix sink
//! - `background` - Background task payload adapter
//! - `notifier` - Notification bridge contract and message copy
//! - `replay` - File-backed location source for offline runs
//! - `journal` - Transition output to file (JSONL format)

pub mod background;
pub mod journal;
pub mod location;
pub mod notifier;
pub mod replay;

// Re-export commonly used types
pub use background::{BackgroundTaskAdapter, BackgroundTaskError};
pub use journal::TransitionJournal;
pub use location::{
    BackgroundRegistration, FixHandler, FixOutcome, FixSink, ForegroundNotice, LocationSource,
    SourceError, SubscriptionHandle, SubscriptionRequest,
};
pub use notifier::{notification_content, LogNotifier, NotificationBridge, NotifyError};
pub use replay::ReplaySource;
