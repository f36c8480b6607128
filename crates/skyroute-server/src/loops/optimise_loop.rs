//! Route optimisation worker.
//!
//! Consumes the routes change feed one insert at a time: corridor fetch,
//! A* search on a blocking thread, impact scoring, key-scoped writeback
//! and a best-effort notification. The writeback never re-enters the
//! feed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::task;
use tracing::{error, info, warn};

use skyroute_core::corridor::{self, ROUTE_BUFFER_M, ROUTE_STEP_M};
use skyroute_core::impact;
use skyroute_core::models::{GeoPoint, Point};
use skyroute_core::optimizer::optimize_route;

use crate::events::RouteOptimisedData;
use crate::persistence::{OptimisedOutcome, RouteInsert};
use crate::state::AppState;

/// Attempts per insert before giving up.
const MAX_ATTEMPTS: u32 = 2;
/// Inserts older than this are skipped rather than optimised late.
const MAX_RECORD_AGE_SECS: i64 = 300;

pub async fn run_optimise_loop(
    state: Arc<AppState>,
    mut feed: mpsc::Receiver<RouteInsert>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Optimise loop shutting down");
                break;
            }
            insert = feed.recv() => {
                let Some(insert) = insert else {
                    info!("Route change feed closed");
                    break;
                };
                handle_insert(&state, insert).await;
            }
        }
    }
}

/// Process one change-feed insert with bounded retries.
pub async fn handle_insert(state: &AppState, insert: RouteInsert) {
    let age_secs = (Utc::now() - insert.created_at).num_seconds();
    if age_secs > MAX_RECORD_AGE_SECS {
        error!(
            route_id = %insert.id,
            age_secs,
            "route insert exceeded the maximum record age, skipping"
        );
        return;
    }

    if state.in_flight.insert(insert.id.clone(), ()).is_some() {
        warn!(route_id = %insert.id, "route already being optimised, ignoring duplicate delivery");
        return;
    }

    for attempt in 1..=MAX_ATTEMPTS {
        match process_insert(state, &insert).await {
            Ok(()) => break,
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(route_id = %insert.id, attempt, "optimisation attempt failed: {}", err);
            }
            Err(err) => {
                error!(route_id = %insert.id, "optimisation failed: {}", err);
            }
        }
    }

    state.in_flight.remove(&insert.id);
}

async fn process_insert(state: &AppState, insert: &RouteInsert) -> Result<()> {
    let deadline = Duration::from_secs(state.config.optimise_timeout_secs);
    let outcome = match tokio::time::timeout(deadline, optimise(state, insert)).await {
        Ok(outcome) => outcome?,
        Err(_) => {
            warn!(
                route_id = %insert.id,
                "optimisation deadline exceeded, falling back to the straight line"
            );
            build_outcome(vec![insert.start, insert.end], &[])
        }
    };

    state.routes.update_optimised(&insert.id, &outcome).await?;
    publish(state, &insert.id, &outcome).await;
    Ok(())
}

async fn optimise(state: &AppState, insert: &RouteInsert) -> Result<OptimisedOutcome> {
    let hashes = corridor::route_hashes(
        insert.start,
        insert.end,
        state.config.precisions.partition,
        ROUTE_STEP_M,
        ROUTE_BUFFER_M,
    );
    let fetched = state.spatial.fetch_by_hash_prefixes(&hashes, false).await;

    // The search is CPU-bound; keep it off the async workers.
    let (start, end) = (insert.start, insert.end);
    let optimizer_config = state.config.optimizer();
    let corridor_points = fetched.clone();
    let route = task::spawn_blocking(move || {
        optimize_route(start, end, &corridor_points, &optimizer_config)
    })
    .await?;

    let near = corridor::points_near_route(&route, &fetched);
    Ok(build_outcome(route, &near))
}

fn build_outcome(route: Vec<Point>, near: &[GeoPoint]) -> OptimisedOutcome {
    let population_impact = impact::population_impact(near);
    let weather = impact::weather_impact(near);
    OptimisedOutcome {
        route_distance_km: impact::route_distance_km(&route),
        population_impact,
        noise_impact: impact::noise_impact(population_impact),
        visibility_risk: weather.visibility_risk,
        wind_risk: weather.wind_risk,
        route,
    }
}

/// Best-effort publish; the persisted update is the system of record.
async fn publish(state: &AppState, route_id: &str, outcome: &OptimisedOutcome) {
    if !state.events.is_configured() {
        return;
    }
    let data = RouteOptimisedData {
        id: route_id.to_string(),
        route: outcome.route.clone(),
        route_distance: outcome.route_distance_km,
        population_impact: outcome.population_impact,
        noise_impact_score: outcome.noise_impact,
        visibility_risk: outcome.visibility_risk,
        wind_risk: outcome.wind_risk,
    };
    if let Err(err) = state.events.publish_route_optimised(&data).await {
        warn!(route_id = %route_id, "failed to publish optimisation event: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::EventPublisher;
    use crate::persistence::{init_database, RoutesStore, SpatialStore};
    use skyroute_core::models::PopulationCell;

    async fn memory_state() -> (Arc<AppState>, mpsc::Receiver<RouteInsert>) {
        let mut config = Config::from_env();
        config.database_path = ":memory:".to_string();
        config.database_max_connections = 1;

        let db = init_database(&config).await.expect("init db");
        let spatial = SpatialStore::new(
            db.pool().clone(),
            config.spatial_table.clone(),
            config.precisions,
        );
        let (routes, feed) = RoutesStore::new(db.pool().clone(), config.routes_table.clone());
        let events = EventPublisher::new(String::new(), String::new());
        (Arc::new(AppState::new(config, spatial, routes, events)), feed)
    }

    #[tokio::test]
    async fn test_degenerate_route_falls_back_to_straight_line() {
        let (state, mut feed) = memory_state().await;
        let point = Point::new(51.5074, -0.1278);

        let id = state.routes.create_route(point, point).await.unwrap();
        let insert = feed.recv().await.expect("insert event");
        handle_insert(&state, insert).await;

        let record = state.routes.get_route(&id).await.unwrap().expect("record");
        assert_eq!(record.optimised_route, Some(vec![point, point]));
        assert_eq!(record.population_impact, Some(0.0));
        assert_eq!(record.noise_impact, Some(0.0));
        assert_eq!(record.visibility_risk, None);
    }

    #[tokio::test]
    async fn test_optimisation_reduces_population_exposure() {
        let (state, mut feed) = memory_state().await;
        let start = Point::new(51.500, -0.130);
        let end = Point::new(51.554, -0.130);
        let blocker = GeoPoint::Population(PopulationCell {
            lat: 51.5271,
            lon: -0.130,
            population: 10_000.0,
        });
        state.spatial.write_batch(std::slice::from_ref(&blocker), 500.0).await;

        let id = state.routes.create_route(start, end).await.unwrap();
        let insert = feed.recv().await.expect("insert event");
        handle_insert(&state, insert).await;

        let record = state.routes.get_route(&id).await.unwrap().expect("record");
        let straight_impact = impact::population_impact(&corridor::points_near_route(
            &[start, end],
            std::slice::from_ref(&blocker),
        ));
        assert!(record.population_impact.unwrap() <= straight_impact);
        let optimised = record.optimised_route.expect("optimised route");
        assert_eq!(optimised.first(), Some(&start));
        assert_eq!(optimised.last(), Some(&end));
    }

    #[tokio::test]
    async fn test_replayed_insert_is_idempotent() {
        let (state, mut feed) = memory_state().await;
        let start = Point::new(51.5074, -0.1278);
        let end = Point::new(51.53, -0.10);

        let id = state.routes.create_route(start, end).await.unwrap();
        let insert = feed.recv().await.expect("insert event");

        handle_insert(&state, insert.clone()).await;
        let first = state.routes.get_route(&id).await.unwrap().expect("record");

        handle_insert(&state, insert).await;
        let second = state.routes.get_route(&id).await.unwrap().expect("record");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_insert_is_skipped() {
        let (state, mut feed) = memory_state().await;
        let start = Point::new(51.5074, -0.1278);
        let end = Point::new(51.53, -0.10);

        let id = state.routes.create_route(start, end).await.unwrap();
        let mut insert = feed.recv().await.expect("insert event");
        insert.created_at = insert.created_at - chrono::Duration::seconds(MAX_RECORD_AGE_SECS + 60);

        handle_insert(&state, insert).await;
        let record = state.routes.get_route(&id).await.unwrap().expect("record");
        assert!(record.optimised_route.is_none());
    }
}
