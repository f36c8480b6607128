//! Population grid bootstrap.
//!
//! Cells are written once at startup; values above the dataset's
//! 95th percentile also land in the sparse index for cheap large-area
//! scans.

use tracing::info;

use skyroute_core::models::{GeoPoint, PopulationCell};

use crate::persistence::SpatialStore;

/// Nearest-rank 95th percentile of the cell populations.
fn percentile_95(cells: &[PopulationCell]) -> f64 {
    if cells.is_empty() {
        return f64::INFINITY;
    }
    let mut values: Vec<f64> = cells.iter().map(|cell| cell.population).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = ((values.len() as f64) * 0.95).ceil() as usize;
    values[rank.saturating_sub(1).min(values.len() - 1)]
}

/// Write the full cell dataset, marking cells above the 95th-percentile
/// threshold for the sparse index. Returns the threshold.
pub async fn bootstrap_cells(store: &SpatialStore, cells: Vec<PopulationCell>) -> f64 {
    let threshold = percentile_95(&cells);
    info!(
        cells = cells.len(),
        threshold, "bootstrapping population grid"
    );

    let points: Vec<GeoPoint> = cells.into_iter().map(GeoPoint::Population).collect();
    store.write_batch(&points, threshold).await;
    threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(populations: &[f64]) -> Vec<PopulationCell> {
        populations
            .iter()
            .enumerate()
            .map(|(i, &population)| PopulationCell {
                lat: i as f64 * 0.01,
                lon: 0.0,
                population,
            })
            .collect()
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let data = cells(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
        // ceil(10 * 0.95) = 10th value.
        assert_eq!(percentile_95(&data), 100.0);

        let data = cells(&(1..=100).map(|v| v as f64).collect::<Vec<_>>());
        assert_eq!(percentile_95(&data), 95.0);
    }

    #[test]
    fn test_percentile_empty_dataset() {
        assert_eq!(percentile_95(&[]), f64::INFINITY);
    }
}
