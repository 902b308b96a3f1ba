#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle proximity predicate.
//!
//! Every higher layer (duplicate suppression, clustering, cluster merging)
//! decides "same physical location" through [`is_nearby`]. The functions
//! here are pure; callers validate coordinates before invoking them, which
//! [`Coordinates`] guarantees by construction.

use bridge_aid_incident_models::Coordinates;

/// Mean Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points (haversine).
#[must_use]
pub fn haversine_distance_m(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let dlat = (b.latitude() - a.latitude()).to_radians();
    let dlng = (b.longitude() - a.longitude()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Returns `true` if `a` and `b` are within `threshold_m` meters of each
/// other. The boundary is inclusive.
#[must_use]
pub fn is_nearby(a: Coordinates, b: Coordinates, threshold_m: f64) -> bool {
    haversine_distance_m(a, b) <= threshold_m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn identical_points_are_zero_apart() {
        let p = pt(43.5183, -79.8774);
        assert!(haversine_distance_m(p, p).abs() < f64::EPSILON);
        assert!(is_nearby(p, p, 0.0));
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_distance_m(pt(0.0, 0.0), pt(1.0, 0.0));
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6, "got {d}, expected {expected}");
    }

    #[test]
    fn nearby_is_symmetric() {
        let a = pt(43.5183, -79.8774);
        let b = pt(43.5190, -79.8780);
        assert!(is_nearby(a, b, 200.0));
        assert!(is_nearby(b, a, 200.0));
        assert!(
            (haversine_distance_m(a, b) - haversine_distance_m(b, a)).abs() < 1e-9,
            "distance should be symmetric"
        );
    }

    #[test]
    fn far_points_are_not_nearby() {
        let milton = pt(43.5183, -79.8774);
        let toronto = pt(43.6532, -79.3832);
        assert!(!is_nearby(milton, toronto, 200.0));
        assert!(!is_nearby(toronto, milton, 200.0));
    }

    #[test]
    fn threshold_is_inclusive() {
        let a = pt(43.5183, -79.8774);
        let b = pt(43.5195, -79.8774);
        let d = haversine_distance_m(a, b);
        assert!(is_nearby(a, b, d));
        assert!(!is_nearby(a, b, d - 0.001));
    }

    #[test]
    fn works_across_the_antimeridian() {
        let west = pt(0.0, 179.9995);
        let east = pt(0.0, -179.9995);
        assert!(is_nearby(west, east, 200.0));
    }
}
