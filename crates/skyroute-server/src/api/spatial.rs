//! Viewport queries over the sparse spatial index.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use skyroute_core::corridor;
use skyroute_core::models::{BoundingBox, GeoPoint};

use crate::error::Error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportParams {
    lat_min: Option<f64>,
    lon_min: Option<f64>,
    lat_max: Option<f64>,
    lon_max: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ViewportResponse {
    pub items: Vec<GeoPoint>,
    pub count: usize,
}

fn require(value: Option<f64>, name: &str) -> Result<f64, Error> {
    value.ok_or_else(|| Error::InvalidInput(format!("{name} is required")))
}

pub async fn bounding_box(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewportParams>,
) -> Result<Json<ViewportResponse>, Error> {
    let bbox = BoundingBox {
        lat_min: require(params.lat_min, "latMin")?,
        lon_min: require(params.lon_min, "lonMin")?,
        lat_max: require(params.lat_max, "latMax")?,
        lon_max: require(params.lon_max, "lonMax")?,
    };

    let hashes = corridor::bounding_box_hashes(&bbox, state.config.precisions.sparse);
    let fetched = state.spatial.fetch_by_hash_prefixes(&hashes, true).await;

    // The sparse cells are coarse; enforce the viewport strictly.
    let items: Vec<GeoPoint> = fetched
        .into_iter()
        .filter(|point| bbox.contains(point.lat(), point.lon()))
        .collect();
    let count = items.len();

    Ok(Json(ViewportResponse { items, count }))
}
