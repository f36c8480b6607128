//! Weather report ingestion.
//!
//! The scheduled METAR decoder hands over already-parsed observations;
//! this module validates coordinates, converts units and writes the
//! reports. Invalid records are dropped, not written.

use chrono::Utc;
use tracing::warn;

use skyroute_core::models::{GeoPoint, WeatherObservation, WeatherReport};

use crate::persistence::SpatialStore;

/// Convert and store a batch of observations. Returns how many were
/// written; the remainder were invalid.
pub async fn store_observations(
    store: &SpatialStore,
    observations: Vec<WeatherObservation>,
) -> usize {
    let now = Utc::now();
    let mut reports = Vec::with_capacity(observations.len());
    for observation in observations {
        match WeatherReport::from_observation(&observation, now) {
            Some(report) => reports.push(GeoPoint::Weather(report)),
            None => warn!(
                lat = observation.latitude,
                lon = observation.longitude,
                "dropping weather report with invalid coordinates"
            ),
        }
    }

    let stored = reports.len();
    // Weather reports are always sparse-indexed; the population
    // threshold is irrelevant here.
    store.write_batch(&reports, f64::INFINITY).await;
    stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::persistence::init_database;
    use skyroute_core::geohash;

    async fn memory_store() -> SpatialStore {
        let mut config = Config::from_env();
        config.database_path = ":memory:".to_string();
        config.database_max_connections = 1;
        let db = init_database(&config).await.expect("init db");
        SpatialStore::new(
            db.pool().clone(),
            config.spatial_table.clone(),
            config.precisions,
        )
    }

    fn observation(lat: f64, lon: f64) -> WeatherObservation {
        WeatherObservation {
            latitude: lat,
            longitude: lon,
            temp_c: Some(15.6),
            wind_speed_kt: Some(10.0),
            visibility_statute_mi: Some("10".to_string()),
            precipitation_level: Some(0),
            observation_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_invalid_coordinates_never_reach_the_store() {
        let store = memory_store().await;
        let stored = store_observations(
            &store,
            vec![observation(91.0, -122.37), observation(37.62, -122.37)],
        )
        .await;
        assert_eq!(stored, 1);

        let prefix = geohash::encode(37.62, -122.37, 5);
        let items = store.query_by_hash_prefix(&prefix, false).await.unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            GeoPoint::Weather(report) => {
                assert_eq!(report.wind_speed_ms, Some(5.1));
                assert_eq!(report.visibility_meters, Some(200_000.0));
                assert_eq!(report.temperature_c, Some(15.6));
            }
            GeoPoint::Population(_) => panic!("expected a weather report"),
        }
    }
}
