//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `monitor` - Tracking lifecycle and per-fix orchestration
//! - `status_tracker` - Latest containment snapshot per zone
//! - `transition_detector` - Edge-triggered entry/exit detection
//! - `notification_worker` - Async notification dispatch worker

pub mod monitor;
pub mod notification_worker;
pub mod status_tracker;
pub mod transition_detector;

// Re-export commonly used types
pub use monitor::{EngineError, ZoneMonitor};
pub use notification_worker::{create_notification_worker, Dispatch, NotificationWorker};
pub use status_tracker::{StatusSnapshot, ZoneStatusTracker};
pub use transition_detector::{TransitionDetector, Transitions};
