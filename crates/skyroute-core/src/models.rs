//! Domain models: geopoints, route records and spatial key derivation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geohash;
use crate::impact::round1;

const KNOTS_TO_MS: f64 = 0.5144;
const STATUTE_MILE_M: f64 = 1609.34;
/// Stored when the source reports visibility as "10+ statute miles".
const MAX_VISIBILITY_M: f64 = 200_000.0;

/// A polyline vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both coordinates inside the valid WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Axis-aligned viewport rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.lat_min <= lat && lat <= self.lat_max && self.lon_min <= lon && lon <= self.lon_max
    }
}

/// Geohash precisions for the three key classes: primary partition,
/// intra-partition sort, and the sparse large-area index.
#[derive(Debug, Clone, Copy)]
pub struct HashPrecisions {
    pub partition: usize,
    pub sort: usize,
    pub sparse: usize,
}

impl Default for HashPrecisions {
    fn default() -> Self {
        Self {
            partition: 5,
            sort: 8,
            sparse: 4,
        }
    }
}

/// A ~1 km² population grid cell. Loaded once at bootstrap and treated
/// as immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationCell {
    pub lat: f64,
    pub lon: f64,
    pub population: f64,
}

/// A decoded weather observation pinned to a station coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_meters: Option<f64>,
    /// 0 (none) to 4 (heavy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_level: Option<u8>,
    pub data_timestamp: DateTime<Utc>,
    pub record_timestamp: DateTime<Utc>,
    /// Expiry as epoch seconds, 24h after capture.
    pub ttl: i64,
}

/// Raw fields handed over by the METAR decoder before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherObservation {
    pub latitude: f64,
    pub longitude: f64,
    pub temp_c: Option<f64>,
    pub wind_speed_kt: Option<f64>,
    /// Raw text; "10" or "10+" means ten-or-more statute miles.
    pub visibility_statute_mi: Option<String>,
    pub precipitation_level: Option<u8>,
    pub observation_time: DateTime<Utc>,
}

impl WeatherReport {
    /// Validate and convert a decoded observation.
    ///
    /// Returns `None` when the coordinates are out of range; such
    /// records are dropped during ingestion rather than written.
    pub fn from_observation(obs: &WeatherObservation, recorded_at: DateTime<Utc>) -> Option<Self> {
        if !Point::new(obs.latitude, obs.longitude).is_valid() {
            return None;
        }

        let visibility_meters = obs.visibility_statute_mi.as_deref().and_then(|raw| {
            if raw.starts_with("10") {
                return Some(MAX_VISIBILITY_M);
            }
            raw.parse::<f64>().ok().map(|mi| (mi * STATUTE_MILE_M).round())
        });

        Some(Self {
            lat: obs.latitude,
            lon: obs.longitude,
            temperature_c: obs.temp_c,
            wind_speed_ms: obs.wind_speed_kt.map(|kt| round1(kt * KNOTS_TO_MS)),
            visibility_meters,
            precipitation_level: obs.precipitation_level,
            data_timestamp: obs.observation_time,
            record_timestamp: recorded_at,
            ttl: (recorded_at + Duration::hours(24)).timestamp(),
        })
    }
}

/// Everything the spatial store holds, as a tagged variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GeoPoint {
    Population(PopulationCell),
    Weather(WeatherReport),
}

impl GeoPoint {
    pub fn lat(&self) -> f64 {
        match self {
            GeoPoint::Population(cell) => cell.lat,
            GeoPoint::Weather(report) => report.lat,
        }
    }

    pub fn lon(&self) -> f64 {
        match self {
            GeoPoint::Population(cell) => cell.lon,
            GeoPoint::Weather(report) => report.lon,
        }
    }

    /// The `<type>#` prefix used in sort keys.
    pub fn type_prefix(&self) -> &'static str {
        match self {
            GeoPoint::Population(_) => "population",
            GeoPoint::Weather(_) => "weather",
        }
    }

    /// Primary partition key: the coarse geohash of the coordinate.
    pub fn partition_key(&self, precisions: &HashPrecisions) -> String {
        geohash::encode(self.lat(), self.lon(), precisions.partition)
    }

    /// Sort key: type prefix plus the fine geohash, so items order
    /// spatially within a partition.
    pub fn sort_key(&self, precisions: &HashPrecisions) -> String {
        format!(
            "{}#{}",
            self.type_prefix(),
            geohash::encode(self.lat(), self.lon(), precisions.sort)
        )
    }

    /// Sparse-index partition key.
    pub fn sparse_partition_key(&self, precisions: &HashPrecisions) -> String {
        geohash::encode(self.lat(), self.lon(), precisions.sparse)
    }

    /// Whether this point belongs in the sparse index. Weather reports
    /// always do; population cells only above the dataset's
    /// 95th-percentile threshold.
    pub fn sparse_indexed(&self, population_threshold: f64) -> bool {
        match self {
            GeoPoint::Population(cell) => cell.population > population_threshold,
            GeoPoint::Weather(_) => true,
        }
    }
}

/// A submitted route and, once the worker has run, its optimisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub id: String,
    pub route_points: Vec<Point>,
    /// Expiry as epoch seconds, 7 days after submission.
    pub ttl: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimised_route: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimised_route_distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_risk: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_risk: Option<f64>,
}
