//! Per-fix zone status computation
//!
//! Recomputes the full status set on every fix and swaps it in as a single
//! snapshot. Statuses are never patched in place, so zones removed between
//! fixes simply stop appearing.

use crate::domain::geo;
use crate::domain::types::{LocationFix, Zone, ZoneStatus};
use crate::infra::metrics::Metrics;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable status snapshot shared with readers
pub type StatusSnapshot = Arc<[ZoneStatus]>;

/// Holds the last computed status snapshot
pub struct ZoneStatusTracker {
    snapshot: StatusSnapshot,
    metrics: Option<Arc<Metrics>>,
}

impl ZoneStatusTracker {
    pub fn new() -> Self {
        Self { snapshot: Arc::from(Vec::new()), metrics: None }
    }

    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self { snapshot: Arc::from(Vec::new()), metrics: Some(metrics) }
    }

    /// Last computed snapshot
    #[inline]
    pub fn current_statuses(&self) -> StatusSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Evaluate every zone against `fix` and replace the snapshot
    ///
    /// Invalid zones and repeated ids are skipped for this fix only.
    pub fn on_fix(&mut self, fix: &LocationFix, zones: &[Zone]) -> StatusSnapshot {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut statuses = Vec::with_capacity(zones.len());

        for zone in zones {
            if !seen.insert(zone.id.as_str()) {
                warn!(zone_id = %zone.id, "zone_duplicate_id_skipped");
                self.record_zone_skipped();
                continue;
            }

            match geo::evaluate(fix, zone) {
                Ok(containment) => statuses.push(ZoneStatus {
                    zone_id: zone.id.clone(),
                    is_inside: containment.is_inside,
                    distance_m: containment.distance_m,
                    observed_at: fix.timestamp,
                }),
                Err(e) => {
                    warn!(zone_id = %zone.id, error = %e, "zone_invalid_skipped");
                    self.record_zone_skipped();
                }
            }
        }

        debug!(
            zones = %zones.len(),
            evaluated = %statuses.len(),
            inside = %statuses.iter().filter(|s| s.is_inside).count(),
            "zone_statuses_computed"
        );

        self.snapshot = Arc::from(statuses);
        self.current_statuses()
    }

    /// Drop the snapshot (new session)
    pub fn reset(&mut self) {
        self.snapshot = Arc::from(Vec::new());
    }

    fn record_zone_skipped(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_zone_skipped();
        }
    }
}

impl Default for ZoneStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
