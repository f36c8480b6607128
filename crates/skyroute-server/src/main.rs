//! Skyroute Server - geospatial route planning for low-altitude drone operations

use anyhow::Result;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skyroute_server::api;
use skyroute_server::config::Config;
use skyroute_server::events::EventPublisher;
use skyroute_server::loops;
use skyroute_server::persistence::{self, RoutesStore, SpatialStore};
use skyroute_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("skyroute_server=debug".parse()?))
        .init();

    tracing::info!("Starting Skyroute Server...");

    let config = Config::from_env();
    let port = config.server_port;

    let db = persistence::init_database(&config).await?;
    let spatial = SpatialStore::new(
        db.pool().clone(),
        config.spatial_table.clone(),
        config.precisions,
    );
    let (routes, feed) = RoutesStore::new(db.pool().clone(), config.routes_table.clone());
    let events = EventPublisher::new(
        config.events_http_domain.clone(),
        config.events_api_key.clone(),
    );
    let state = Arc::new(AppState::new(config, spatial, routes, events));

    // Start the optimisation worker
    let (shutdown_tx, _) = broadcast::channel(1);
    tokio::spawn(loops::optimise_loop::run_optimise_loop(
        state.clone(),
        feed,
        shutdown_tx.subscribe(),
    ));

    // Build the app
    let app = api::routes()
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
