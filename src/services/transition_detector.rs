//! Edge-triggered entry/exit detection
//!
//! Compares the previous containment of each zone against the new snapshot.
//! Only boundary crossings produce events:
//! - No prior status + inside counts as an entry
//! - Outside -> inside is an entry, inside -> outside is an exit
//! - No change emits nothing, so lingering in a zone never repeats an alert
//! - Zones that disappear are forgotten without an exit

use crate::domain::types::{TransitionEvent, TransitionKind, Zone, ZoneStatus};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

/// Events produced by a single fix; more than a handful is unusual
pub type Transitions = SmallVec<[TransitionEvent; 4]>;

/// Remembers the last containment per zone id
pub struct TransitionDetector {
    previous: FxHashMap<String, bool>,
}

impl TransitionDetector {
    pub fn new() -> Self {
        Self { previous: FxHashMap::default() }
    }

    /// Diff `statuses` against the retained state and adopt them as the new state
    ///
    /// Containment is always adopted; the per-zone toggles only decide whether
    /// an event is emitted.
    pub fn detect(&mut self, statuses: &[ZoneStatus], zones: &[Zone]) -> Transitions {
        let mut events = Transitions::new();
        let mut next: FxHashMap<String, bool> =
            FxHashMap::with_capacity_and_hasher(statuses.len(), Default::default());

        for status in statuses {
            let was_inside = self.previous.get(&status.zone_id).copied();
            let kind = match (was_inside, status.is_inside) {
                (None | Some(false), true) => Some(TransitionKind::Entry),
                (Some(true), false) => Some(TransitionKind::Exit),
                _ => None,
            };

            if let Some(kind) = kind {
                let enabled = zones
                    .iter()
                    .find(|z| z.id == status.zone_id)
                    .is_some_and(|z| z.notifies_on(kind));

                if enabled {
                    events.push(TransitionEvent {
                        zone_id: status.zone_id.clone(),
                        kind,
                        at: status.observed_at,
                    });
                } else {
                    debug!(
                        zone_id = %status.zone_id,
                        kind = %kind.as_str(),
                        "transition_suppressed_by_toggle"
                    );
                }
            }

            next.insert(status.zone_id.clone(), status.is_inside);
        }

        self.previous = next;
        events
    }

    /// Last known containment for a zone
    pub fn was_inside(&self, zone_id: &str) -> Option<bool> {
        self.previous.get(zone_id).copied()
    }

    /// Forget all prior state (new session)
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

impl Default for TransitionDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Coordinate, ZoneKind};

    fn zone(id: &str) -> Zone {
        Zone::new(id, Coordinate::new(0.0, 0.0), 50.0, ZoneKind::SavingOpportunity)
    }

    fn status(id: &str, is_inside: bool, at: u64) -> ZoneStatus {
        ZoneStatus {
            zone_id: id.to_string(),
            is_inside,
            distance_m: if is_inside { 10.0 } else { 100.0 },
            observed_at: at,
        }
    }

    #[test]
    fn test_first_observation_inside_is_entry() {
        let mut detector = TransitionDetector::new();
        let events = detector.detect(&[status("z1", true, 1)], &[zone("z1")]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TransitionKind::Entry);
        assert_eq!(events[0].at, 1);
    }

    #[test]
    fn test_first_observation_outside_is_silent() {
        let mut detector = TransitionDetector::new();
        let events = detector.detect(&[status("z1", false, 1)], &[zone("z1")]);

        assert!(events.is_empty());
        assert_eq!(detector.was_inside("z1"), Some(false));
    }

    #[test]
    fn test_lingering_inside_emits_once() {
        let mut detector = TransitionDetector::new();
        let zones = [zone("z1")];

        let counts: Vec<usize> =
            (1..=5).map(|t| detector.detect(&[status("z1", true, t)], &zones).len()).collect();

        assert_eq!(counts, vec![1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_entry_then_exit() {
        let mut detector = TransitionDetector::new();
        let zones = [zone("z1")];

        assert!(detector.detect(&[status("z1", false, 1)], &zones).is_empty());
        let entry = detector.detect(&[status("z1", true, 2)], &zones);
        let exit = detector.detect(&[status("z1", false, 3)], &zones);

        assert_eq!(entry.len(), 1);
        assert_eq!(entry[0].kind, TransitionKind::Entry);
        assert_eq!(exit.len(), 1);
        assert_eq!(exit[0].kind, TransitionKind::Exit);
        assert_eq!(exit[0].at, 3);
    }

    #[test]
    fn test_entry_toggle_off_still_tracks_containment() {
        let mut detector = TransitionDetector::new();
        let zones = [zone("z1").with_notifications(false, true)];

        detector.detect(&[status("z1", false, 1)], &zones);
        let events = detector.detect(&[status("z1", true, 2)], &zones);

        assert!(events.is_empty());
        assert_eq!(detector.was_inside("z1"), Some(true));

        // Exit still fires because containment was adopted
        let events = detector.detect(&[status("z1", false, 3)], &zones);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TransitionKind::Exit);
    }

    #[test]
    fn test_exit_toggle_off() {
        let mut detector = TransitionDetector::new();
        let zones = [zone("z1").with_notifications(true, false)];

        detector.detect(&[status("z1", true, 1)], &zones);
        let events = detector.detect(&[status("z1", false, 2)], &zones);
        assert!(events.is_empty());
    }

    #[test]
    fn test_removed_zone_dropped_without_exit() {
        let mut detector = TransitionDetector::new();

        detector.detect(&[status("z1", true, 1), status("z2", true, 1)], &[zone("z1"), zone("z2")]);
        let events = detector.detect(&[status("z2", true, 2)], &[zone("z2")]);

        assert!(events.is_empty());
        assert_eq!(detector.was_inside("z1"), None);
    }

    #[test]
    fn test_readded_zone_counts_as_new() {
        let mut detector = TransitionDetector::new();

        detector.detect(&[status("z1", true, 1)], &[zone("z1")]);
        detector.detect(&[], &[]);
        let events = detector.detect(&[status("z1", true, 3)], &[zone("z1")]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TransitionKind::Entry);
    }

    #[test]
    fn test_reset_forgets_state() {
        let mut detector = TransitionDetector::new();
        detector.detect(&[status("z1", true, 1)], &[zone("z1")]);
        detector.reset();
        assert_eq!(detector.was_inside("z1"), None);
    }
}
