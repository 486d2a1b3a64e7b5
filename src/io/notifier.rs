//! Notification bridge - user-facing alerts for zone transitions
//!
//! Delivery itself lives outside the engine. This module holds the contract,
//! the alert copy for each zone kind, and a notifier that only logs.

use crate::domain::types::{TransitionKind, Zone, ZoneKind};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers alerts for zone transitions
#[async_trait]
pub trait NotificationBridge: Send + Sync {
    async fn notify(&self, zone: &Zone, kind: TransitionKind) -> Result<(), NotifyError>;
}

/// Rendered alert text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

/// Alert copy for a transition; kind only changes the wording
pub fn notification_content(zone: &Zone, kind: TransitionKind) -> NotificationContent {
    let name = zone.display_name();
    let (title, body) = match (zone.kind, kind) {
        (ZoneKind::HighExpense, TransitionKind::Entry) => (
            "High-expense zone".to_string(),
            format!("You just entered {}. Keep an eye on your spending.", name),
        ),
        (ZoneKind::HighExpense, TransitionKind::Exit) => (
            "Left high-expense zone".to_string(),
            format!("You left {}. Nice job staying on budget.", name),
        ),
        (ZoneKind::SavingOpportunity, TransitionKind::Entry) => (
            "Saving opportunity nearby".to_string(),
            format!("You are at {}. Check for deals before you buy.", name),
        ),
        (ZoneKind::SavingOpportunity, TransitionKind::Exit) => (
            "Left saving zone".to_string(),
            format!("You left {}.", name),
        ),
    };
    NotificationContent { title, body }
}

/// Notifier that writes alerts to the log
pub struct LogNotifier;

#[async_trait]
impl NotificationBridge for LogNotifier {
    async fn notify(&self, zone: &Zone, kind: TransitionKind) -> Result<(), NotifyError> {
        let content = notification_content(zone, kind);
        info!(
            zone_id = %zone.id,
            zone_kind = %zone.kind.as_str(),
            kind = %kind.as_str(),
            title = %content.title,
            body = %content.body,
            "notification"
        );
        Ok(())
    }
}
