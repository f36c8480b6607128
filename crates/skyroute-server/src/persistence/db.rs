//! Database connection and schema initialization.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Database connection wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Initialize the SQLite database.
///
/// Creates the database file if it doesn't exist, creates the
/// configured geopoint and route tables, and returns a connection pool.
pub async fn init_database(config: &Config) -> Result<Database> {
    // Ensure parent directory exists
    if let Some(parent) = Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", config.database_path);
    info!("Connecting to database: {}", config.database_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&db_url)
        .await?;

    create_tables(&pool, &config.spatial_table, &config.routes_table).await?;

    Ok(Database { pool })
}

/// Create the geopoint and route tables. Table names come from
/// configuration, so the statements are built rather than embedded.
async fn create_tables(pool: &SqlitePool, spatial_table: &str, routes_table: &str) -> Result<()> {
    info!("Creating tables {} and {}", spatial_table, routes_table);

    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {spatial_table} (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                gsi1pk TEXT,
                gsi1sk TEXT,
                point_type TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                population REAL,
                temperature_c REAL,
                wind_speed_ms REAL,
                visibility_meters REAL,
                precipitation_level INTEGER,
                data_timestamp TEXT,
                record_timestamp TEXT,
                ttl INTEGER,
                PRIMARY KEY (pk, sk)
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{spatial_table}_gsi1
                ON {spatial_table} (gsi1pk, gsi1sk)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {routes_table} (
                pk TEXT PRIMARY KEY,
                route_points TEXT NOT NULL,
                ttl INTEGER NOT NULL,
                optimised_route TEXT,
                optimised_route_distance_km REAL,
                population_impact REAL,
                noise_impact REAL,
                visibility_risk REAL,
                wind_risk REAL
            )"
        ),
    ];

    for statement in statements {
        sqlx::query(&statement).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_database() {
        let mut config = Config::from_env();
        config.database_path = ":memory:".to_string();
        config.database_max_connections = 1;

        let db = init_database(&config).await.unwrap();

        let result: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='geopoints'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();

        assert_eq!(result.0, 1);
    }
}
