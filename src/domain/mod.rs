//! Domain models - zones, fixes and derived containment state
//!
//! This module contains the canonical data types used throughout the engine:
//! - `Zone` - a circular region with a notification policy
//! - `LocationFix` - a timestamped location reading
//! - `ZoneStatus` - containment of the user in one zone at one fix
//! - `TransitionEvent` - an entry or exit boundary crossing
//! - `geo` - haversine distance and containment evaluation

pub mod geo;
pub mod types;

pub use geo::{distance, evaluate, Containment, ZoneError};
pub use types::{
    Coordinate, LifecycleState, LocationFix, TrackingMode, TransitionEvent, TransitionKind, Zone,
    ZoneKind, ZoneStatus,
};
