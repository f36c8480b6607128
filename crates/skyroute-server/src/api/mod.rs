//! API routes for the skyroute server.

pub mod routing;
pub mod spatial;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/spatial/bounding-box", get(spatial::bounding_box))
        .route("/routes/assess-route", get(routing::assess_route))
        .route("/routes/optimise-route", post(routing::optimise_route))
}
