//! Shared application state.

use dashmap::DashMap;

use crate::config::Config;
use crate::events::EventPublisher;
use crate::persistence::{RoutesStore, SpatialStore};

pub struct AppState {
    pub config: Config,
    pub spatial: SpatialStore,
    pub routes: RoutesStore,
    pub events: EventPublisher,
    /// Route ids currently being optimised; guarantees at most one
    /// active worker per record under duplicate deliveries.
    pub in_flight: DashMap<String, ()>,
}

impl AppState {
    pub fn new(
        config: Config,
        spatial: SpatialStore,
        routes: RoutesStore,
        events: EventPublisher,
    ) -> Self {
        Self {
            config,
            spatial,
            routes,
            events,
            in_flight: DashMap::new(),
        }
    }
}
