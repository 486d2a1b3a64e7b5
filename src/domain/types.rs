//! Shared types for the zone monitor

use serde::{Deserialize, Serialize};

/// A point on the Earth in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both components are finite and inside the WGS84 ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Zone classification, only affects notification copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    HighExpense,
    SavingOpportunity,
}

impl ZoneKind {
    pub fn as_str(&self) -> &str {
        match self {
            ZoneKind::HighExpense => "high_expense",
            ZoneKind::SavingOpportunity => "saving_opportunity",
        }
    }
}

/// A circular monitored region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub center: Coordinate,
    pub radius_m: f64,
    pub kind: ZoneKind,
    #[serde(default = "default_notify")]
    pub notify_on_entry: bool,
    #[serde(default = "default_notify")]
    pub notify_on_exit: bool,
}

fn default_notify() -> bool {
    true
}

impl Zone {
    /// Create a zone that notifies on both entry and exit
    pub fn new(id: impl Into<String>, center: Coordinate, radius_m: f64, kind: ZoneKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            center,
            radius_m,
            kind,
            notify_on_entry: true,
            notify_on_exit: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_notifications(mut self, on_entry: bool, on_exit: bool) -> Self {
        self.notify_on_entry = on_entry;
        self.notify_on_exit = on_exit;
        self
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Whether this transition kind should produce an event for this zone
    #[inline]
    pub fn notifies_on(&self, kind: TransitionKind) -> bool {
        match kind {
            TransitionKind::Entry => self.notify_on_entry,
            TransitionKind::Exit => self.notify_on_exit,
        }
    }
}

/// A single timestamped location reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds
    pub timestamp: u64,
}

impl LocationFix {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        Self { latitude, longitude, timestamp }
    }

    #[inline]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Computed containment of the user in one zone at one fix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatus {
    pub zone_id: String,
    pub is_inside: bool,
    pub distance_m: f64,
    /// Timestamp of the fix this status was computed from (epoch ms)
    pub observed_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Entry,
    Exit,
}

impl TransitionKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransitionKind::Entry => "entry",
            TransitionKind::Exit => "exit",
        }
    }
}

/// A boundary crossing for one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    pub zone_id: String,
    pub kind: TransitionKind,
    /// Timestamp of the fix that produced the crossing (epoch ms)
    pub at: u64,
}

/// How fixes are delivered while a session is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Recurring watch while the app is in use
    Foreground,
    /// OS-scheduled delivery while the app is suspended
    Background,
}

impl TrackingMode {
    pub fn as_str(&self) -> &str {
        match self {
            TrackingMode::Foreground => "foreground",
            TrackingMode::Background => "background",
        }
    }
}

impl std::str::FromStr for TrackingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foreground" => Ok(TrackingMode::Foreground),
            "background" => Ok(TrackingMode::Background),
            other => Err(format!("unknown tracking mode: {}", other)),
        }
    }
}

/// Monitoring lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl LifecycleState {
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::Active => "active",
            LifecycleState::Stopping => "stopping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_mode_from_str() {
        assert_eq!("foreground".parse::<TrackingMode>().unwrap(), TrackingMode::Foreground);
        assert_eq!("background".parse::<TrackingMode>().unwrap(), TrackingMode::Background);
        assert!("sideways".parse::<TrackingMode>().is_err());
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_zone_display_name_falls_back_to_id() {
        let zone = Zone::new("z1", Coordinate::new(0.0, 0.0), 50.0, ZoneKind::HighExpense);
        assert_eq!(zone.display_name(), "z1");
        assert_eq!(zone.with_name("Mall").display_name(), "Mall");
    }

    #[test]
    fn test_zone_deserialize_defaults_toggles() {
        let zone: Zone = serde_json::from_str(
            r#"{"id":"z1","center":{"latitude":1.0,"longitude":2.0},"radius_m":75.0,"kind":"saving_opportunity"}"#,
        )
        .unwrap();
        assert!(zone.notify_on_entry);
        assert!(zone.notify_on_exit);
        assert_eq!(zone.kind, ZoneKind::SavingOpportunity);
        assert!(zone.notifies_on(TransitionKind::Exit));
    }
}
