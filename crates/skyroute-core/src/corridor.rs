//! Corridor scanning: which geohash cells a route can touch, and which
//! stored points sit close enough to a polyline to matter.

use std::collections::HashSet;

use crate::geohash;
use crate::geometry::{distance_to_segment_m, haversine_distance, rhumb_bearing, rhumb_destination};
use crate::models::{BoundingBox, GeoPoint, Point};

/// Population cells further than this from the route do not contribute.
pub const POPULATION_NEAR_M: f64 = 500.0;
/// Weather stations are sparse, so a much wider capture radius applies.
pub const WEATHER_NEAR_M: f64 = 20_000.0;

/// Sampling interval along the route when collecting corridor cells.
pub const ROUTE_STEP_M: f64 = 1_000.0;
/// Corridor half-width.
pub const ROUTE_BUFFER_M: f64 = 10_000.0;

const METERS_PER_DEG_LAT: f64 = 111_000.0;

/// All geohashes at the precision whose cells intersect the viewport.
pub fn bounding_box_hashes(bbox: &BoundingBox, precision: usize) -> Vec<String> {
    geohash::bboxes(bbox.lat_min, bbox.lon_min, bbox.lat_max, bbox.lon_max, precision)
}

/// All geohashes whose cells may intersect the corridor of half-width
/// `buffer_m` around the straight start-end course.
///
/// Walks the rhumb line in `step_m` increments and unions the cell
/// cover of a buffer-sized box at each sample; the start and end cells
/// are always included.
pub fn route_hashes(
    start: Point,
    end: Point,
    precision: usize,
    step_m: f64,
    buffer_m: f64,
) -> Vec<String> {
    let mut hashes = HashSet::new();
    hashes.insert(geohash::encode(start.lat, start.lon, precision));
    hashes.insert(geohash::encode(end.lat, end.lon, precision));

    let heading = rhumb_bearing(start.lat, start.lon, end.lat, end.lon);
    let total_m = haversine_distance(start.lat, start.lon, end.lat, end.lon);
    let steps = (total_m / step_m).floor() as usize;

    for i in 0..=steps {
        let (lat, lon) = rhumb_destination(start.lat, start.lon, i as f64 * step_m, heading);
        let d_lat = buffer_m / METERS_PER_DEG_LAT;
        let d_lon = buffer_m / (METERS_PER_DEG_LAT * lat.to_radians().cos());
        for hash in geohash::bboxes(lat - d_lat, lon - d_lon, lat + d_lat, lon + d_lon, precision) {
            hashes.insert(hash);
        }
    }

    hashes.into_iter().collect()
}

/// Points within the per-type distance threshold of the segment a-b.
pub fn points_near_segment(a: Point, b: Point, points: &[GeoPoint]) -> Vec<GeoPoint> {
    points
        .iter()
        .filter(|point| {
            let d = distance_to_segment_m(point.lat(), point.lon(), a.lat, a.lon, b.lat, b.lon);
            match point {
                GeoPoint::Population(_) => d <= POPULATION_NEAR_M,
                GeoPoint::Weather(_) => d <= WEATHER_NEAR_M,
            }
        })
        .cloned()
        .collect()
}

/// Points near any segment of the polyline, deduplicated by coordinate.
pub fn points_near_route(route: &[Point], points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for pair in route.windows(2) {
        for point in points_near_segment(pair[0], pair[1], points) {
            let key = format!("{}:{}", point.lat(), point.lon());
            if seen.insert(key) {
                kept.push(point);
            }
        }
    }
    kept
}
