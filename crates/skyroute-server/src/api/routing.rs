//! Route assessment and asynchronous optimisation submission.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use skyroute_core::corridor::{self, ROUTE_BUFFER_M, ROUTE_STEP_M};
use skyroute_core::impact;
use skyroute_core::models::{GeoPoint, Point};

use crate::error::Error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessParams {
    lat_start: Option<f64>,
    lon_start: Option<f64>,
    lat_end: Option<f64>,
    lon_end: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessResponse {
    pub route: Vec<Point>,
    pub route_distance: f64,
    pub population_impact: f64,
    pub noise_impact_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_risk: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_risk: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimiseRequest {
    start_point: Option<Point>,
    end_point: Option<Point>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimiseResponse {
    pub message: String,
    pub route_id: String,
}

fn require(value: Option<f64>, name: &str) -> Result<f64, Error> {
    value.ok_or_else(|| Error::InvalidInput(format!("{name} is required")))
}

fn validated_point(lat: f64, lon: f64, name: &str) -> Result<Point, Error> {
    let point = Point::new(lat, lon);
    if !point.is_valid() {
        return Err(Error::InvalidInput(format!(
            "{name} is outside the valid coordinate range"
        )));
    }
    Ok(point)
}

/// Assess the straight-line flight between two coordinates.
pub async fn assess_route(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AssessParams>,
) -> Result<Json<AssessResponse>, Error> {
    let start = validated_point(
        require(params.lat_start, "latStart")?,
        require(params.lon_start, "lonStart")?,
        "start",
    )?;
    let end = validated_point(
        require(params.lat_end, "latEnd")?,
        require(params.lon_end, "lonEnd")?,
        "end",
    )?;

    let deadline = Duration::from_secs(state.config.assess_timeout_secs);
    let assessment = tokio::time::timeout(deadline, assess(&state, start, end))
        .await
        .map_err(|_| Error::DeadlineExceeded)?;
    Ok(Json(assessment))
}

async fn assess(state: &AppState, start: Point, end: Point) -> AssessResponse {
    let route = vec![start, end];
    let hashes = corridor::route_hashes(
        start,
        end,
        state.config.precisions.partition,
        ROUTE_STEP_M,
        ROUTE_BUFFER_M,
    );
    let fetched = state.spatial.fetch_by_hash_prefixes(&hashes, false).await;
    let near = corridor::points_near_route(&route, &fetched);
    build_assessment(route, &near)
}

/// Score a polyline against the corridor points already filtered to it.
pub(crate) fn build_assessment(route: Vec<Point>, near: &[GeoPoint]) -> AssessResponse {
    let population_impact = impact::population_impact(near);
    let weather = impact::weather_impact(near);
    AssessResponse {
        route_distance: impact::route_distance_km(&route),
        population_impact,
        noise_impact_score: impact::noise_impact(population_impact),
        visibility_risk: weather.visibility_risk,
        wind_risk: weather.wind_risk,
        route,
    }
}

/// Persist a route record for asynchronous optimisation.
///
/// Returns immediately; the insert event drives the worker.
pub async fn optimise_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OptimiseRequest>,
) -> Result<(StatusCode, Json<OptimiseResponse>), Error> {
    let start = request
        .start_point
        .ok_or_else(|| Error::InvalidInput("startPoint is required".to_string()))?;
    let end = request
        .end_point
        .ok_or_else(|| Error::InvalidInput("endPoint is required".to_string()))?;
    let start = validated_point(start.lat, start.lon, "startPoint")?;
    let end = validated_point(end.lat, end.lon, "endPoint")?;

    let route_id = state.routes.create_route(start, end).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OptimiseResponse {
            message: "route optimisation scheduled".to_string(),
            route_id,
        }),
    ))
}
