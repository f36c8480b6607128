//! Persistence: the geopoint partition and the routes partition.

pub mod db;
pub mod routes;
pub mod spatial;

pub use db::{init_database, Database};
pub use routes::{OptimisedOutcome, RouteInsert, RoutesStore};
pub use spatial::SpatialStore;
