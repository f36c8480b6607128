//! Server configuration from environment.
//!
//! Read once at startup and treated as immutable afterwards.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use skyroute_core::models::HashPrecisions;
use skyroute_core::optimizer::OptimizerConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Logical name of the geopoint partition.
    pub spatial_table: String,
    /// Logical name of the routes partition.
    pub routes_table: String,
    pub precisions: HashPrecisions,
    pub optimizer_step_m: f64,
    pub optimizer_angle_range_deg: f64,
    pub optimizer_fan: usize,
    pub optimizer_max_deviation_ratio: f64,
    /// Host of the notification sink; publishing is disabled when empty.
    pub events_http_domain: String,
    pub events_api_key: String,
    pub assess_timeout_secs: u64,
    pub optimise_timeout_secs: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env_or("SKYROUTE_PORT", 3000),
            database_path: env::var("SKYROUTE_DB")
                .unwrap_or_else(|_| "data/skyroute.db".to_string()),
            database_max_connections: env_or("SKYROUTE_DB_MAX_CONNECTIONS", 5),
            spatial_table: env::var("SPATIAL_DATA_TABLE")
                .unwrap_or_else(|_| "geopoints".to_string()),
            routes_table: env::var("ROUTES_TABLE").unwrap_or_else(|_| "routes".to_string()),
            precisions: HashPrecisions {
                partition: env_or("PARTITION_KEY_HASH_PRECISION", 5),
                sort: env_or("SORT_KEY_HASH_PRECISION", 8),
                sparse: env_or("GSI_HASH_PRECISION", 4),
            },
            optimizer_step_m: env_or("STEP", 1_000.0),
            optimizer_angle_range_deg: env_or("ANGLE_RANGE", 30.0),
            optimizer_fan: env_or("FAN", 10),
            optimizer_max_deviation_ratio: env_or("MAX_DEVIATION_RATIO", 0.20),
            events_http_domain: env::var("EVENTS_HTTP_DOMAIN").unwrap_or_default(),
            events_api_key: env::var("EVENTS_API_KEY").unwrap_or_default(),
            assess_timeout_secs: env_or("ASSESS_TIMEOUT_SECS", 30),
            optimise_timeout_secs: env_or("OPTIMISE_TIMEOUT_SECS", 300),
        }
    }

    /// The optimizer tunables in core form.
    pub fn optimizer(&self) -> OptimizerConfig {
        OptimizerConfig {
            step_m: self.optimizer_step_m,
            angle_range_deg: self.optimizer_angle_range_deg,
            fan: self.optimizer_fan,
            max_deviation_ratio: self.optimizer_max_deviation_ratio,
            max_duration: Duration::from_secs(30),
        }
    }
}
