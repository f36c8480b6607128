//! Geometry kernel: great-circle distance, rhumb-line navigation and
//! point-to-segment distance.
//!
//! All functions are pure and take coordinates in decimal degrees;
//! distances are meters unless stated otherwise.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (Haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Constant-bearing course from point 1 to point 2, in degrees [0, 360).
///
/// A rhumb line crosses every meridian at the same angle, which is how
/// the flight course is modelled throughout the planner.
pub fn rhumb_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let mut dlambda = (lon2 - lon1).to_radians();
    // Take the shorter way around the antimeridian.
    if dlambda.abs() > PI {
        dlambda = if dlambda > 0.0 {
            dlambda - 2.0 * PI
        } else {
            dlambda + 2.0 * PI
        };
    }

    let dpsi = ((FRAC_PI_4 + phi2 / 2.0).tan() / (FRAC_PI_4 + phi1 / 2.0).tan()).ln();
    let theta = dlambda.atan2(dpsi);
    (theta.to_degrees() + 360.0) % 360.0
}

/// Forward computation along a rhumb line: the point `distance_m` from
/// the origin on the constant bearing `bearing_deg`.
pub fn rhumb_destination(lat: f64, lon: f64, distance_m: f64, bearing_deg: f64) -> (f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let dphi = delta * theta.cos();
    let mut phi2 = phi1 + dphi;

    // Reflect back if the track runs over a pole.
    if phi2.abs() > FRAC_PI_2 {
        phi2 = if phi2 > 0.0 { PI - phi2 } else { -PI - phi2 };
    }

    let dpsi = ((FRAC_PI_4 + phi2 / 2.0).tan() / (FRAC_PI_4 + phi1 / 2.0).tan()).ln();
    // dpsi vanishes on east-west courses; the projection factor
    // degenerates to cos(lat).
    let q = if dpsi.abs() > 1e-12 { dphi / dpsi } else { phi1.cos() };

    let dlambda = delta * theta.sin() / q;
    let mut lambda2 = lon.to_radians() + dlambda;
    lambda2 = (lambda2 + PI).rem_euclid(2.0 * PI) - PI;

    (phi2.to_degrees(), lambda2.to_degrees())
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954
        - 559.822 * (2.0 * lat_rad).cos()
        + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Minimum distance in meters from a point to the segment a-b.
///
/// Projects into a local east-north plane anchored at the segment start,
/// which is accurate at corridor scale (tens of kilometers).
pub fn distance_to_segment_m(
    point_lat: f64, point_lon: f64,
    a_lat: f64, a_lon: f64,
    b_lat: f64, b_lon: f64,
) -> f64 {
    let ref_lat = a_lat;
    let m_per_lat = meters_per_deg_lat(ref_lat).max(1e-9);
    let m_per_lon = meters_per_deg_lon(ref_lat).max(1e-9);

    let px = (point_lon - a_lon) * m_per_lon;
    let py = (point_lat - a_lat) * m_per_lat;
    let sx = (b_lon - a_lon) * m_per_lon;
    let sy = (b_lat - a_lat) * m_per_lat;

    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 0.0001 {
        // Segment is essentially a point
        return (px * px + py * py).sqrt();
    }

    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * sx;
    let dy = py - t * sy;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // ~111km between these points (1 degree latitude)
        let dist = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111_194.0).abs() < 100.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_distance(51.5074, -0.1278, 51.5074, -0.1278);
        assert!(dist < 0.001);
    }

    #[test]
    fn test_rhumb_bearing_cardinal_directions() {
        assert!((rhumb_bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((rhumb_bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((rhumb_bearing(1.0, 0.0, 0.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((rhumb_bearing(0.0, 1.0, 0.0, 0.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_rhumb_destination_round_trip() {
        let (lat, lon) = (51.5074, -0.1278);
        let bearing = 47.0;
        let (lat2, lon2) = rhumb_destination(lat, lon, 5_000.0, bearing);
        let dist = haversine_distance(lat, lon, lat2, lon2);
        assert!((dist - 5_000.0).abs() < 10.0);
        assert!((rhumb_bearing(lat, lon, lat2, lon2) - bearing).abs() < 0.1);
    }

    #[test]
    fn test_rhumb_destination_zero_distance() {
        let (lat, lon) = rhumb_destination(40.0, -73.0, 0.0, 123.0);
        assert_eq!((lat, lon), (40.0, -73.0));
    }

    #[test]
    fn test_distance_to_segment_perpendicular() {
        // Point one degree east of a north-south segment through it.
        let d = distance_to_segment_m(0.5, 0.1, 0.0, 0.0, 1.0, 0.0);
        assert!((d - 11_132.0).abs() < 100.0);
    }

    #[test]
    fn test_distance_to_segment_beyond_endpoint() {
        // Closest point is the segment end, not the infinite line.
        let d = distance_to_segment_m(2.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        assert!((d - 110_574.0).abs() < 500.0);
    }

    #[test]
    fn test_distance_to_segment_degenerate() {
        let d = distance_to_segment_m(0.0, 0.1, 0.0, 0.0, 0.0, 0.0);
        assert!((d - 11_132.0).abs() < 100.0);
    }
}
