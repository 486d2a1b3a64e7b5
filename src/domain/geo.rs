//! Great-circle distance and zone containment

use crate::domain::types::{Coordinate, LocationFix, Zone};
use thiserror::Error;

/// Mean Earth radius used by the spherical approximation
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two coordinates in meters
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1_rad = a.latitude.to_radians();
    let lat2_rad = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Reasons a zone is excluded from evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneError {
    #[error("zone id is empty")]
    EmptyId,
    #[error("zone {id} has invalid radius {radius_m}")]
    InvalidRadius { id: String, radius_m: f64 },
    #[error("zone {id} has invalid center {center}")]
    InvalidCenter { id: String, center: Coordinate },
}

/// Check that a zone can be evaluated
pub fn validate_zone(zone: &Zone) -> Result<(), ZoneError> {
    if zone.id.is_empty() {
        return Err(ZoneError::EmptyId);
    }
    if !zone.radius_m.is_finite() || zone.radius_m <= 0.0 {
        return Err(ZoneError::InvalidRadius { id: zone.id.clone(), radius_m: zone.radius_m });
    }
    if !zone.center.is_valid() {
        return Err(ZoneError::InvalidCenter { id: zone.id.clone(), center: zone.center });
    }
    Ok(())
}

/// Containment result for one fix against one zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Containment {
    pub is_inside: bool,
    pub distance_m: f64,
}

/// Decide whether a fix falls inside a zone (boundary inclusive)
pub fn evaluate(fix: &LocationFix, zone: &Zone) -> Result<Containment, ZoneError> {
    validate_zone(zone)?;
    let distance_m = distance(fix.coordinate(), zone.center);
    Ok(Containment { is_inside: distance_m <= zone.radius_m, distance_m })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ZoneKind;

    /// Latitude offset (degrees) that lies `meters` north of the equator
    fn lat_for_meters(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_METERS).to_degrees()
    }

    fn zone_at_origin(radius_m: f64) -> Zone {
        Zone::new("z1", Coordinate::new(0.0, 0.0), radius_m, ZoneKind::HighExpense)
    }

    #[test]
    fn test_distance_identity() {
        let a = Coordinate::new(59.3293, 18.0686);
        assert_eq!(distance(a, a), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let a = Coordinate::new(48.8566, 2.3522);
        let b = Coordinate::new(51.5074, -0.1278);
        assert_eq!(distance(a, b), distance(b, a));
    }

    #[test]
    fn test_distance_paris_london() {
        let paris = Coordinate::new(48.8566, 2.3522);
        let london = Coordinate::new(51.5074, -0.1278);
        // Roughly 343.5 km
        assert!((distance(paris, london) - 343_500.0).abs() < 5000.0);
    }

    #[test]
    fn test_distance_monotonic_for_small_offsets() {
        let origin = Coordinate::new(0.0, 0.0);
        let mut last = 0.0;
        for meters in [1.0, 10.0, 50.0, 100.0, 500.0, 2000.0] {
            let d = distance(origin, Coordinate::new(lat_for_meters(meters), 0.0));
            assert!(d > last);
            assert!((d - meters).abs() < 1e-6 * meters.max(1.0));
            last = d;
        }
    }

    #[test]
    fn test_distance_antipodal_is_finite() {
        let d = distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let zone = zone_at_origin(100.0);
        let on_edge = LocationFix::new(lat_for_meters(100.0) * (1.0 - 1e-12), 0.0, 0);
        let result = evaluate(&on_edge, &zone).unwrap();
        assert!(result.is_inside);
        assert!(result.distance_m <= 100.0);

        let just_outside = LocationFix::new(lat_for_meters(100.01), 0.0, 0);
        let result = evaluate(&just_outside, &zone).unwrap();
        assert!(!result.is_inside);
        assert!(result.distance_m > 100.0);
    }

    #[test]
    fn test_exact_radius_counts_as_inside() {
        let fix = LocationFix::new(lat_for_meters(100.0), 0.0, 0);
        let d = distance(fix.coordinate(), Coordinate::new(0.0, 0.0));
        // Radius equal to the computed distance sits exactly on the boundary
        let zone = zone_at_origin(d);
        assert!(evaluate(&fix, &zone).unwrap().is_inside);
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let fix = LocationFix::new(0.0, 0.0, 0);
        assert!(matches!(
            evaluate(&fix, &zone_at_origin(0.0)),
            Err(ZoneError::InvalidRadius { .. })
        ));
        assert!(matches!(
            evaluate(&fix, &zone_at_origin(-5.0)),
            Err(ZoneError::InvalidRadius { .. })
        ));
        assert!(matches!(
            evaluate(&fix, &zone_at_origin(f64::NAN)),
            Err(ZoneError::InvalidRadius { .. })
        ));
    }

    #[test]
    fn test_invalid_center_rejected() {
        let zone = Zone::new("bad", Coordinate::new(120.0, 0.0), 10.0, ZoneKind::HighExpense);
        assert!(matches!(validate_zone(&zone), Err(ZoneError::InvalidCenter { .. })));
    }

    #[test]
    fn test_empty_id_rejected() {
        let zone = Zone::new("", Coordinate::new(0.0, 0.0), 10.0, ZoneKind::HighExpense);
        assert_eq!(validate_zone(&zone), Err(ZoneError::EmptyId));
    }
}
