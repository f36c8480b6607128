//! Spatial store adapter: paginated partitioned reads over geohash
//! prefixes, and soft-failure batch writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use skyroute_core::models::{GeoPoint, HashPrecisions, PopulationCell, WeatherReport};

use crate::error::Error;

/// Items per page.
const PAGE_LIMIT: i64 = 1000;
/// Pages per prefix before the read is silently truncated. Overlapping
/// prefixes make the corridor scan eventually complete anyway.
const MAX_PAGES: u32 = 10;
/// Concurrent outstanding per-prefix queries.
const FETCH_CONCURRENCY: usize = 50;
/// Items per atomic write group.
const WRITE_BATCH_SIZE: usize = 25;

/// Reads and writes the geopoint partition.
#[derive(Clone)]
pub struct SpatialStore {
    pool: SqlitePool,
    table: String,
    precisions: HashPrecisions,
    write_errors: Arc<AtomicU64>,
}

impl SpatialStore {
    pub fn new(pool: SqlitePool, table: String, precisions: HashPrecisions) -> Self {
        Self {
            pool,
            table,
            precisions,
            write_errors: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Failed write groups since startup.
    pub fn write_error_count(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// All items under one partition, via the primary index or the
    /// sparse index. Paginates transparently; hitting the page cap
    /// truncates without error.
    pub async fn query_by_hash_prefix(
        &self,
        prefix: &str,
        use_sparse_index: bool,
    ) -> Result<Vec<GeoPoint>, Error> {
        let (key_column, sort_column) = if use_sparse_index {
            ("gsi1pk", "gsi1sk")
        } else {
            ("pk", "sk")
        };
        let sql = format!(
            "SELECT pk, sk, gsi1pk, gsi1sk, point_type, lat, lon, population,
                    temperature_c, wind_speed_ms, visibility_meters, precipitation_level,
                    data_timestamp, record_timestamp, ttl
             FROM {} WHERE {} = ?1 AND {} > ?2 ORDER BY {} LIMIT {}",
            self.table, key_column, sort_column, sort_column, PAGE_LIMIT
        );

        let mut items = Vec::new();
        let mut cursor = String::new();
        for _page in 0..MAX_PAGES {
            let rows: Vec<GeoPointRow> = sqlx::query_as(&sql)
                .bind(prefix)
                .bind(&cursor)
                .fetch_all(&self.pool)
                .await
                .map_err(|err| Error::StoreTransient(err.to_string()))?;

            let full_page = rows.len() as i64 == PAGE_LIMIT;
            if let Some(last) = rows.last() {
                cursor = if use_sparse_index {
                    last.gsi1sk.clone().unwrap_or_default()
                } else {
                    last.sk.clone()
                };
            }

            for row in rows {
                match GeoPoint::try_from(row) {
                    Ok(point) => items.push(point),
                    Err(err) => warn!("skipping malformed geopoint row: {}", err),
                }
            }

            if !full_page {
                break;
            }
        }

        Ok(items)
    }

    /// Query many prefixes with a bounded fan-out. Per-prefix failures
    /// are logged and elided; the concatenation is unordered.
    pub async fn fetch_by_hash_prefixes(
        &self,
        prefixes: &[String],
        use_sparse_index: bool,
    ) -> Vec<GeoPoint> {
        let semaphore = Arc::new(Semaphore::new(FETCH_CONCURRENCY));
        let mut join_set = JoinSet::new();

        for prefix in prefixes.iter().cloned() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let store = self.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = store.query_by_hash_prefix(&prefix, use_sparse_index).await;
                (prefix, result)
            });
        }

        let mut items = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(page))) => items.extend(page),
                Ok((prefix, Err(err))) => {
                    warn!("spatial query for prefix {} failed: {}", prefix, err);
                }
                Err(err) => warn!("spatial fetch task failed: {}", err),
            }
        }
        items
    }

    /// Write points in atomic groups of 25. A failed group increments
    /// the error counter and the write continues with the next group.
    ///
    /// Population cells above `gsi_population_threshold` also receive
    /// sparse-index keys; weather reports always do.
    pub async fn write_batch(&self, points: &[GeoPoint], gsi_population_threshold: f64) {
        for group in points.chunks(WRITE_BATCH_SIZE) {
            if let Err(err) = self.write_group(group, gsi_population_threshold).await {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!("geopoint write group failed: {}", err);
            }
        }
    }

    async fn write_group(&self, group: &[GeoPoint], gsi_population_threshold: f64) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} (
                pk, sk, gsi1pk, gsi1sk, point_type, lat, lon, population,
                temperature_c, wind_speed_ms, visibility_meters, precipitation_level,
                data_timestamp, record_timestamp, ttl
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        for point in group {
            let sort_key = point.sort_key(&self.precisions);
            let (gsi1pk, gsi1sk) = if point.sparse_indexed(gsi_population_threshold) {
                (
                    Some(point.sparse_partition_key(&self.precisions)),
                    Some(sort_key.clone()),
                )
            } else {
                (None, None)
            };

            let mut query = sqlx::query(&sql)
                .bind(point.partition_key(&self.precisions))
                .bind(&sort_key)
                .bind(gsi1pk)
                .bind(gsi1sk)
                .bind(point.type_prefix())
                .bind(point.lat())
                .bind(point.lon());

            query = match point {
                GeoPoint::Population(cell) => query
                    .bind(cell.population)
                    .bind(None::<f64>)
                    .bind(None::<f64>)
                    .bind(None::<f64>)
                    .bind(None::<i64>)
                    .bind(None::<String>)
                    .bind(None::<String>)
                    .bind(None::<i64>),
                GeoPoint::Weather(report) => query
                    .bind(None::<f64>)
                    .bind(report.temperature_c)
                    .bind(report.wind_speed_ms)
                    .bind(report.visibility_meters)
                    .bind(report.precipitation_level.map(i64::from))
                    .bind(report.data_timestamp.to_rfc3339())
                    .bind(report.record_timestamp.to_rfc3339())
                    .bind(report.ttl),
            };

            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct GeoPointRow {
    #[allow(dead_code)]
    pk: String,
    sk: String,
    #[allow(dead_code)]
    gsi1pk: Option<String>,
    gsi1sk: Option<String>,
    point_type: String,
    lat: f64,
    lon: f64,
    population: Option<f64>,
    temperature_c: Option<f64>,
    wind_speed_ms: Option<f64>,
    visibility_meters: Option<f64>,
    precipitation_level: Option<i64>,
    data_timestamp: Option<String>,
    record_timestamp: Option<String>,
    ttl: Option<i64>,
}

impl TryFrom<GeoPointRow> for GeoPoint {
    type Error = anyhow::Error;

    fn try_from(row: GeoPointRow) -> Result<Self> {
        match row.point_type.as_str() {
            "population" => Ok(GeoPoint::Population(PopulationCell {
                lat: row.lat,
                lon: row.lon,
                population: row
                    .population
                    .ok_or_else(|| anyhow::anyhow!("population cell without a count"))?,
            })),
            "weather" => Ok(GeoPoint::Weather(WeatherReport {
                lat: row.lat,
                lon: row.lon,
                temperature_c: row.temperature_c,
                wind_speed_ms: row.wind_speed_ms,
                visibility_meters: row.visibility_meters,
                precipitation_level: row.precipitation_level.map(|level| level as u8),
                data_timestamp: parse_timestamp(row.data_timestamp.as_deref()),
                record_timestamp: parse_timestamp(row.record_timestamp.as_deref()),
                ttl: row.ttl.unwrap_or(0),
            })),
            other => anyhow::bail!("unknown geopoint type: {}", other),
        }
    }
}

fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
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

    fn population(lat: f64, lon: f64, count: f64) -> GeoPoint {
        GeoPoint::Population(PopulationCell {
            lat,
            lon,
            population: count,
        })
    }

    #[tokio::test]
    async fn test_write_and_query_primary_index() {
        let store = memory_store().await;
        let point = population(40.75, -73.97, 1200.0);
        store.write_batch(std::slice::from_ref(&point), 500.0).await;

        let prefix = geohash::encode(40.75, -73.97, 5);
        let items = store.query_by_hash_prefix(&prefix, false).await.unwrap();
        assert_eq!(items, vec![point]);
        assert_eq!(store.write_error_count(), 0);
    }

    #[tokio::test]
    async fn test_sparse_index_skips_low_population() {
        let store = memory_store().await;
        store
            .write_batch(
                &[
                    population(40.75, -73.97, 1200.0),
                    population(40.7501, -73.9701, 10.0),
                ],
                500.0,
            )
            .await;

        let prefix = geohash::encode(40.75, -73.97, 4);
        let sparse = store.query_by_hash_prefix(&prefix, true).await.unwrap();
        assert_eq!(sparse.len(), 1);
        assert_eq!(
            sparse[0],
            population(40.75, -73.97, 1200.0)
        );
    }

    #[tokio::test]
    async fn test_fetch_elides_empty_prefixes() {
        let store = memory_store().await;
        let point = population(40.75, -73.97, 1200.0);
        store.write_batch(std::slice::from_ref(&point), 500.0).await;

        let prefixes = vec![
            geohash::encode(40.75, -73.97, 5),
            "zzzzz".to_string(),
        ];
        let items = store.fetch_by_hash_prefixes(&prefixes, false).await;
        assert_eq!(items, vec![point]);
    }
}
