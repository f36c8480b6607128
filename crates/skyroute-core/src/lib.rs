//! Skyroute Core - Pure logic for ground-impact assessment and routing
//!
//! This crate contains the domain models and business logic
//! with NO networking dependencies.

pub mod corridor;
pub mod geohash;
pub mod geometry;
pub mod impact;
pub mod models;
pub mod optimizer;

pub use geometry::haversine_distance;
pub use models::{BoundingBox, GeoPoint, HashPrecisions, Point, PopulationCell, WeatherReport};
pub use optimizer::{optimize_route, OptimizerConfig};
