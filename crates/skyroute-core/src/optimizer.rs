//! Constrained-deviation A* route search.
//!
//! Nodes are geographic points; each expansion fans out a handful of
//! candidate bearings around the direct course and steps a fixed
//! distance along the rhumb line. Cost is population exposure near the
//! candidate, the heuristic is remaining distance, and candidates
//! straying past the deviation budget are discarded. Every expansion
//! moves a full step forward, so the reachable state space is finite; a
//! wall-clock cap backstops the search.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::geometry::{distance_to_segment_m, haversine_distance, rhumb_bearing, rhumb_destination};
use crate::models::{GeoPoint, Point, PopulationCell};

/// Candidates within this range of a population cell pay double.
const PENALTY_NEAR_M: f64 = 500.0;
/// Candidates within this range pay the full cell population.
const PENALTY_MID_M: f64 = 1_000.0;

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Forward distance per expansion.
    pub step_m: f64,
    /// Half-width of the candidate bearing fan, degrees either side of
    /// the direct course.
    pub angle_range_deg: f64,
    /// Candidate bearings per expansion.
    pub fan: usize,
    /// Maximum perpendicular deviation from the direct line, as a
    /// fraction of its length.
    pub max_deviation_ratio: f64,
    /// Wall-clock budget before falling back to the straight line.
    pub max_duration: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            step_m: 1_000.0,
            angle_range_deg: 30.0,
            fan: 10,
            max_deviation_ratio: 0.20,
            max_duration: Duration::from_secs(30),
        }
    }
}

/// Node identity: coordinates rounded to six decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeKey {
    lat_e6: i64,
    lon_e6: i64,
}

impl NodeKey {
    fn of(point: Point) -> Self {
        Self {
            lat_e6: (point.lat * 1e6).round() as i64,
            lon_e6: (point.lon * 1e6).round() as i64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f64,
    g: f64,
    seq: u64,
    point: Point,
}

// Min-heap on f, ties broken by lower realized cost, then insertion
// order, so expansions are deterministic.
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.g.total_cmp(&self.g))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

/// Exposure cost of stepping onto `node`.
fn population_penalty(cell: &PopulationCell, node: Point) -> f64 {
    let d = haversine_distance(cell.lat, cell.lon, node.lat, node.lon);
    if d <= PENALTY_NEAR_M {
        cell.population * 2.0
    } else if d <= PENALTY_MID_M {
        cell.population
    } else {
        0.0
    }
}

/// Search for a polyline from `start` to `end` minimising cumulative
/// population penalty within the deviation budget.
///
/// Falls back to `[start, end]` when the open set drains or the time
/// budget expires.
pub fn optimize_route(
    start: Point,
    end: Point,
    points: &[GeoPoint],
    config: &OptimizerConfig,
) -> Vec<Point> {
    let population: Vec<&PopulationCell> = points
        .iter()
        .filter_map(|point| match point {
            GeoPoint::Population(cell) => Some(cell),
            GeoPoint::Weather(_) => None,
        })
        .collect();

    let direct_m = haversine_distance(start.lat, start.lon, end.lat, end.lon);
    let max_deviation_m = config.max_deviation_ratio * direct_m;
    let fan = config.fan.max(2);
    let started = Instant::now();

    let mut open = BinaryHeap::new();
    let mut parents: HashMap<NodeKey, NodeKey> = HashMap::new();
    let mut node_points: HashMap<NodeKey, Point> = HashMap::new();
    let mut best_g: HashMap<NodeKey, f64> = HashMap::new();
    let mut closed: HashSet<NodeKey> = HashSet::new();
    let mut seq = 0u64;

    let start_key = NodeKey::of(start);
    node_points.insert(start_key, start);
    best_g.insert(start_key, 0.0);
    open.push(OpenEntry {
        f: direct_m,
        g: 0.0,
        seq,
        point: start,
    });

    while let Some(entry) = open.pop() {
        if started.elapsed() > config.max_duration {
            break;
        }

        let key = NodeKey::of(entry.point);
        if !closed.insert(key) {
            continue;
        }

        if haversine_distance(entry.point.lat, entry.point.lon, end.lat, end.lon) <= config.step_m {
            return reconstruct(&parents, &node_points, key, end);
        }

        let direct_bearing = rhumb_bearing(entry.point.lat, entry.point.lon, end.lat, end.lon);
        for i in 0..fan {
            let offset =
                config.angle_range_deg * (2.0 * i as f64 / (fan - 1) as f64 - 1.0);
            let (lat, lon) = rhumb_destination(
                entry.point.lat,
                entry.point.lon,
                config.step_m,
                direct_bearing + offset,
            );
            let candidate = Point::new(lat, lon);

            if distance_to_segment_m(lat, lon, start.lat, start.lon, end.lat, end.lon)
                > max_deviation_m
            {
                continue;
            }

            let candidate_key = NodeKey::of(candidate);
            if closed.contains(&candidate_key) {
                continue;
            }

            let step_cost: f64 = population
                .iter()
                .map(|cell| population_penalty(cell, candidate))
                .sum();
            let tentative_g = entry.g + step_cost;
            if let Some(&known) = best_g.get(&candidate_key) {
                if tentative_g >= known {
                    continue;
                }
            }

            best_g.insert(candidate_key, tentative_g);
            parents.insert(candidate_key, key);
            node_points.insert(candidate_key, candidate);
            seq += 1;
            open.push(OpenEntry {
                f: tentative_g + haversine_distance(lat, lon, end.lat, end.lon),
                g: tentative_g,
                seq,
                point: candidate,
            });
        }
    }

    vec![start, end]
}

fn reconstruct(
    parents: &HashMap<NodeKey, NodeKey>,
    node_points: &HashMap<NodeKey, Point>,
    terminal: NodeKey,
    end: Point,
) -> Vec<Point> {
    let mut path = Vec::new();
    let mut cursor = Some(terminal);
    while let Some(key) = cursor {
        if let Some(point) = node_points.get(&key) {
            path.push(*point);
        }
        cursor = parents.get(&key).copied();
    }
    path.reverse();
    path.push(end);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corridor::points_near_route;
    use crate::impact::population_impact;
    use crate::models::PopulationCell;

    fn cell(lat: f64, lon: f64, population: f64) -> GeoPoint {
        GeoPoint::Population(PopulationCell { lat, lon, population })
    }

    #[test]
    fn test_degenerate_route_returns_straight_line() {
        let point = Point::new(51.5074, -0.1278);
        let route = optimize_route(point, point, &[], &OptimizerConfig::default());
        assert_eq!(route, vec![point, point]);
    }

    #[test]
    fn test_empty_population_is_free_and_terminates() {
        let start = Point::new(51.500, -0.130);
        let end = Point::new(51.554, -0.130);
        let route = optimize_route(start, end, &[], &OptimizerConfig::default());
        assert!(route.len() >= 2);
        assert_eq!(route.first(), Some(&start));
        assert_eq!(route.last(), Some(&end));
        assert_eq!(population_impact(&points_near_route(&route, &[])), 0.0);
    }

    #[test]
    fn test_deviation_budget_respected() {
        let start = Point::new(51.500, -0.130);
        let end = Point::new(51.554, -0.130);
        let config = OptimizerConfig::default();
        let direct_m = haversine_distance(start.lat, start.lon, end.lat, end.lon);
        let limit = config.max_deviation_ratio * direct_m;

        let blocker = cell(51.5271, -0.130, 10_000.0);
        let route = optimize_route(start, end, &[blocker], &config);
        for node in &route[1..route.len() - 1] {
            let deviation = distance_to_segment_m(
                node.lat, node.lon, start.lat, start.lon, end.lat, end.lon,
            );
            assert!(
                deviation <= limit + 1.0,
                "node deviates {deviation:.0}m, limit {limit:.0}m"
            );
        }
    }

    #[test]
    fn test_avoids_population_on_direct_line() {
        let start = Point::new(51.500, -0.130);
        let end = Point::new(51.554, -0.130);
        let blocker_cell = PopulationCell {
            lat: 51.5271,
            lon: -0.130,
            population: 10_000.0,
        };
        let points = vec![GeoPoint::Population(blocker_cell.clone())];

        let optimized = optimize_route(start, end, &points, &OptimizerConfig::default());
        let cleared = optimized.iter().any(|node| {
            haversine_distance(node.lat, node.lon, blocker_cell.lat, blocker_cell.lon) > 500.0
        });
        assert!(cleared);

        let straight_impact = population_impact(&points_near_route(&[start, end], &points));
        let optimized_impact = population_impact(&points_near_route(&optimized, &points));
        assert!(optimized_impact <= straight_impact);
        assert_eq!(straight_impact, 1000.0);
    }

    #[test]
    fn test_expansions_prefer_cheaper_realized_cost_on_tie() {
        let a = OpenEntry { f: 10.0, g: 2.0, seq: 1, point: Point::new(0.0, 0.0) };
        let b = OpenEntry { f: 10.0, g: 5.0, seq: 0, point: Point::new(0.0, 0.0) };
        // Max-heap pops the "greater" entry; lower g must win the tie.
        assert!(a > b);
    }
}
