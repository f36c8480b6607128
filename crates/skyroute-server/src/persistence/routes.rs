//! Routes store: submitted route records, their optimisation writeback
//! and the insert-only change feed that drives the worker.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::error;
use ulid::Ulid;

use skyroute_core::models::{Point, RouteRecord};

use crate::error::Error;

/// Days a submitted route is retained.
const ROUTE_TTL_DAYS: i64 = 7;
/// Pending inserts buffered for the worker before submits wait.
const CHANGE_FEED_CAPACITY: usize = 256;

/// A change-feed event. Only inserts are ever emitted; the worker's own
/// update writeback cannot re-trigger it.
#[derive(Debug, Clone)]
pub struct RouteInsert {
    pub id: String,
    pub start: Point,
    pub end: Point,
    pub created_at: DateTime<Utc>,
}

/// What the worker writes back after a search completes.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisedOutcome {
    pub route: Vec<Point>,
    pub route_distance_km: f64,
    pub population_impact: f64,
    pub noise_impact: f64,
    pub visibility_risk: Option<f64>,
    pub wind_risk: Option<f64>,
}

#[derive(Clone)]
pub struct RoutesStore {
    pool: SqlitePool,
    table: String,
    feed: mpsc::Sender<RouteInsert>,
}

impl RoutesStore {
    /// Create the store and the receiving end of its change feed.
    pub fn new(pool: SqlitePool, table: String) -> (Self, mpsc::Receiver<RouteInsert>) {
        let (feed, receiver) = mpsc::channel(CHANGE_FEED_CAPACITY);
        (Self { pool, table, feed }, receiver)
    }

    /// Persist a new route record and emit its insert event.
    ///
    /// Persistence failure is fatal and surfaces to the caller; a dead
    /// feed (worker gone) is logged but does not fail the submit.
    pub async fn create_route(&self, start: Point, end: Point) -> Result<String, Error> {
        let id = Ulid::new().to_string();
        let ttl = (Utc::now() + Duration::days(ROUTE_TTL_DAYS)).timestamp();
        let route_points = serde_json::to_string(&[start, end])
            .map_err(|err| Error::StoreFatal(err.to_string()))?;

        let sql = format!(
            "INSERT INTO {} (pk, route_points, ttl) VALUES (?1, ?2, ?3)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&route_points)
            .bind(ttl)
            .execute(&self.pool)
            .await
            .map_err(|err| Error::StoreFatal(err.to_string()))?;

        let insert = RouteInsert {
            id: id.clone(),
            start,
            end,
            created_at: Utc::now(),
        };
        if self.feed.send(insert).await.is_err() {
            error!(route_id = %id, "route change feed is closed; record will not be optimised");
        }

        Ok(id)
    }

    /// Key-scoped writeback of an optimisation outcome. Never inserts,
    /// never emits a feed event, and overwrites any previous outcome so
    /// duplicate deliveries converge on the same state.
    pub async fn update_optimised(&self, id: &str, outcome: &OptimisedOutcome) -> Result<(), Error> {
        let optimised_route = serde_json::to_string(&outcome.route)
            .map_err(|err| Error::StoreFatal(err.to_string()))?;

        let sql = format!(
            "UPDATE {} SET
                optimised_route = ?2,
                optimised_route_distance_km = ?3,
                population_impact = ?4,
                noise_impact = ?5,
                visibility_risk = ?6,
                wind_risk = ?7
             WHERE pk = ?1",
            self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(&optimised_route)
            .bind(outcome.route_distance_km)
            .bind(outcome.population_impact)
            .bind(outcome.noise_impact)
            .bind(outcome.visibility_risk)
            .bind(outcome.wind_risk)
            .execute(&self.pool)
            .await
            .map_err(|err| Error::StoreFatal(err.to_string()))?;

        Ok(())
    }

    pub async fn get_route(&self, id: &str) -> Result<Option<RouteRecord>, Error> {
        let sql = format!(
            "SELECT pk, route_points, ttl, optimised_route, optimised_route_distance_km,
                    population_impact, noise_impact, visibility_risk, wind_risk
             FROM {} WHERE pk = ?1",
            self.table
        );
        let row: Option<RouteRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| Error::StoreTransient(err.to_string()))?;

        match row {
            Some(row) => {
                let record = row
                    .try_into()
                    .map_err(|err: anyhow::Error| Error::StoreTransient(err.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct RouteRow {
    pk: String,
    route_points: String,
    ttl: i64,
    optimised_route: Option<String>,
    optimised_route_distance_km: Option<f64>,
    population_impact: Option<f64>,
    noise_impact: Option<f64>,
    visibility_risk: Option<f64>,
    wind_risk: Option<f64>,
}

impl TryFrom<RouteRow> for RouteRecord {
    type Error = anyhow::Error;

    fn try_from(row: RouteRow) -> Result<Self> {
        let route_points: Vec<Point> = serde_json::from_str(&row.route_points)?;
        let optimised_route = match row.optimised_route {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };

        Ok(RouteRecord {
            id: row.pk,
            route_points,
            ttl: row.ttl,
            optimised_route,
            optimised_route_distance_km: row.optimised_route_distance_km,
            population_impact: row.population_impact,
            noise_impact: row.noise_impact,
            visibility_risk: row.visibility_risk,
            wind_risk: row.wind_risk,
        })
    }
}
