//! Ground-impact scoring over a set of corridor geopoints.

use crate::geometry::haversine_distance;
use crate::models::{GeoPoint, Point};

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Direct footprint of a single pass over a ~1 km² cell.
const FOOTPRINT_FACTOR: f64 = 0.1;

/// Round-trip route distance in km, to one decimal place.
///
/// The out-and-back doubling and the meters-to-km conversion are folded
/// into a single divisor; downstream consumers rely on this scale.
pub fn route_distance_km(route: &[Point]) -> f64 {
    let mut meters = 0.0;
    for pair in route.windows(2) {
        meters += haversine_distance(pair[0].lat, pair[0].lon, pair[1].lat, pair[1].lon);
    }
    round1(meters / 500.0)
}

/// Population exposed to a single pass, rounded to a whole count.
pub fn population_impact(points: &[GeoPoint]) -> f64 {
    let total: f64 = points
        .iter()
        .map(|point| match point {
            GeoPoint::Population(cell) => cell.population,
            GeoPoint::Weather(_) => 0.0,
        })
        .sum();
    (total * FOOTPRINT_FACTOR).round()
}

/// Noise score on a 0-5 scale, linear in population impact.
pub fn noise_impact(population_impact: f64) -> f64 {
    round1((population_impact / 1000.0).clamp(0.0, 5.0))
}

/// Weather-derived risk scores; absent when the corridor holds no
/// weather observations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeatherImpact {
    pub visibility_risk: Option<f64>,
    pub wind_risk: Option<f64>,
}

/// Max-reduce per-observation visibility and wind risks to 0-5 scores.
pub fn weather_impact(points: &[GeoPoint]) -> WeatherImpact {
    let mut seen_weather = false;
    let mut visibility_max = 0.0_f64;
    let mut wind_max = 0.0_f64;

    for point in points {
        match point {
            GeoPoint::Population(_) => {}
            GeoPoint::Weather(report) => {
                seen_weather = true;
                let visibility_risk = match report.visibility_meters {
                    Some(visibility) if visibility < 1000.0 => (1000.0 - visibility) / 200.0,
                    _ => 0.0,
                };
                let wind_risk = match report.wind_speed_ms {
                    Some(wind) if wind > 20.0 => 5.0,
                    Some(wind) => wind / 4.0,
                    None => 0.0,
                };
                visibility_max = visibility_max.max(visibility_risk);
                wind_max = wind_max.max(wind_risk);
            }
        }
    }

    if !seen_weather {
        return WeatherImpact::default();
    }
    WeatherImpact {
        visibility_risk: Some(round1(visibility_max)),
        wind_risk: Some(round1(wind_max)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PopulationCell, WeatherReport};
    use chrono::Utc;

    fn cell(population: f64) -> GeoPoint {
        GeoPoint::Population(PopulationCell {
            lat: 0.0,
            lon: 0.0,
            population,
        })
    }

    fn weather(visibility: Option<f64>, wind: Option<f64>) -> GeoPoint {
        GeoPoint::Weather(WeatherReport {
            lat: 0.0,
            lon: 0.0,
            temperature_c: None,
            wind_speed_ms: wind,
            visibility_meters: visibility,
            precipitation_level: None,
            data_timestamp: Utc::now(),
            record_timestamp: Utc::now(),
            ttl: 0,
        })
    }

    #[test]
    fn test_route_distance_round_trip_convention() {
        let route = [Point::new(51.5074, -0.1278), Point::new(51.5300, -0.1000)];
        let distance = route_distance_km(&route);
        // ~3.2km one way, doubled and scaled to km.
        assert!(distance >= 6.0 && distance <= 6.7, "got {distance}");
    }

    #[test]
    fn test_route_distance_empty_route() {
        assert_eq!(route_distance_km(&[]), 0.0);
        assert_eq!(route_distance_km(&[Point::new(0.0, 0.0)]), 0.0);
    }

    #[test]
    fn test_population_impact_ignores_weather() {
        let points = vec![cell(1000.0), cell(2500.0), weather(Some(600.0), None)];
        assert_eq!(population_impact(&points), 350.0);
    }

    #[test]
    fn test_noise_impact_clamps_at_five() {
        assert_eq!(noise_impact(0.0), 0.0);
        assert_eq!(noise_impact(350.0), 0.4);
        assert_eq!(noise_impact(80_000.0), 5.0);
    }

    #[test]
    fn test_weather_impact_scores() {
        let points = vec![weather(Some(600.0), Some(24.0))];
        let impact = weather_impact(&points);
        assert_eq!(impact.visibility_risk, Some(2.0));
        assert_eq!(impact.wind_risk, Some(5.0));
    }

    #[test]
    fn test_weather_impact_max_reduction() {
        let points = vec![
            weather(Some(900.0), Some(8.0)),
            weather(Some(700.0), Some(4.0)),
            weather(None, None),
        ];
        let impact = weather_impact(&points);
        assert_eq!(impact.visibility_risk, Some(1.5));
        assert_eq!(impact.wind_risk, Some(2.0));
    }

    #[test]
    fn test_weather_impact_absent_without_observations() {
        let impact = weather_impact(&[cell(100.0)]);
        assert_eq!(impact.visibility_risk, None);
        assert_eq!(impact.wind_risk, None);
    }
}
