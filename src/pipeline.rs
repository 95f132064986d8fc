use chrono::{NaiveDate, TimeDelta, Utc};
use log::{debug, info};
use crate::config::{Config, ScoringOptions};
use crate::manager_elevation::ElevationService;
use crate::manager_forecast::errors::ForecastError;
use crate::manager_forecast::{ForecastClient, Transport};
use crate::models::terrain::TerrainProfile;
use crate::rate_limit::Pacer;
use crate::report::ThermalReport;
use crate::terrain::{TerrainCache, TerrainEstimator};
use crate::thermal::calculate_thermal_time_series;

/// Days ahead of today covered when no end date is configured
const DEFAULT_WINDOW_DAYS: i64 = 2;

/// Resolves the configured window, missing dates default to today and today plus two days
///
/// # Arguments
///
/// * 'config' - the configuration
/// * 'today' - current UTC date
pub fn resolve_window(config: &Config, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = config.window.start_date
        .unwrap_or_else(|| config.window.end_date.map_or(today, |end| end.min(today)));
    let end = config.window.end_date.unwrap_or(start.max(today) + TimeDelta::days(DEFAULT_WINDOW_DAYS));

    (start, end)
}

/// Runs one scoring pass for the configured location: fetches the forecast, gets terrain
/// shape (configured overrides win over the terrain lookup) and scores every hour.
///
/// A forecast failure ends the pass, terrain problems only flatten the terrain.
///
/// # Arguments
///
/// * 'config' - the configuration
/// * 'forecast' - forecast client
/// * 'terrain' - terrain estimator
/// * 'cache' - terrain cache
/// * 'today' - current UTC date
pub fn score_location<T, FP, E, TP>(
    config: &Config,
    forecast: &mut ForecastClient<T, FP>,
    terrain: &mut TerrainEstimator<E, TP>,
    cache: &mut TerrainCache,
    today: NaiveDate) -> Result<ThermalReport, ForecastError>
where
    T: Transport,
    FP: Pacer,
    E: ElevationService,
    TP: Pacer,
{
    let (lat, lon) = (config.location.lat, config.location.long);
    let (start_date, end_date) = resolve_window(config, today);
    info!("scoring {:.4},{:.4} for {} - {}", lat, lon, start_date, end_date);

    let series = forecast.fetch(lat, lon, start_date, end_date, today)?;

    let terrain_profile = match (config.scoring.slope_deg, config.scoring.aspect_deg) {
        (Some(slope_deg), Some(aspect_deg)) => {
            debug!("using configured terrain, slope {} aspect {}", slope_deg, aspect_deg);
            TerrainProfile { slope_deg, aspect_deg, elevation: 0.0 }
        },
        (slope, aspect) => {
            let mut profile = terrain.get_terrain_data_cached(cache, lat, lon, config.terrain.grid_size_m);
            debug!("terrain cache holds {} profile(s)", cache.len());
            profile.slope_deg = slope.unwrap_or(profile.slope_deg);
            profile.aspect_deg = aspect.unwrap_or(profile.aspect_deg);
            profile
        },
    };

    let options = ScoringOptions {
        slope_deg: terrain_profile.slope_deg,
        aspect_deg: terrain_profile.aspect_deg,
        zi: config.scoring.zi,
    };
    let scores = calculate_thermal_time_series(&series, &options);
    info!("scored {} hour(s)", scores.len());

    Ok(ThermalReport {
        created: Utc::now(),
        location: config.location.into(),
        start_date,
        end_date,
        terrain: terrain_profile,
        zi: config.scoring.zi,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;
    use super::*;
    use crate::config::parse_config;
    use crate::manager_forecast::errors::TransportError;
    use crate::rate_limit::RecordingPacer;

    const BODY: &str = r#"{
        "hourly": {
            "time": ["2024-06-01T10:00", "2024-06-01T12:00", "2024-06-01T22:00"],
            "temperature_2m": [18.0, 22.0, 14.0],
            "pressure_msl": [1013.0, 1012.0, 1012.5],
            "relative_humidity_2m": [55, 45, 70],
            "wind_speed_10m": [3.5, 4.0, 1.0],
            "wind_direction_10m": [180, 180, 90],
            "cloud_cover": [10, 0, 80]
        }
    }"#;

    struct FixedTransport(Result<String, TransportError>);

    impl Transport for FixedTransport {
        fn get(&self, _url: &str, _query: &[(&str, String)]) -> Result<String, TransportError> {
            self.0.clone()
        }
    }

    /// Terrain rising towards north
    struct SouthSlope {
        calls: Cell<usize>,
    }

    impl ElevationService for &SouthSlope {
        fn get_elevation(&self, lat: f64, _lon: f64) -> Option<f64> {
            self.calls.set(self.calls.get() + 1);
            Some(1000.0 + (lat - 46.0) * 111000.0 * 0.2)
        }
    }

    fn config(extra: &str) -> Config {
        parse_config(&format!("[location]\nlat = 46.0\nlong = 7.0\n{}", extra)).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn window_defaults_to_today_and_two_days_ahead() {
        assert_eq!(resolve_window(&config(""), today()), (today(), NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()));

        let past = config("[window]\nstart_date = \"2024-05-01\"\nend_date = \"2024-05-04\"\n");
        assert_eq!(
            resolve_window(&past, today()),
            (NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 5, 4).unwrap())
        );
    }

    #[test]
    fn scores_every_forecast_hour_with_looked_up_terrain() {
        let config = config("");
        let elevation = SouthSlope { calls: Cell::new(0) };
        let mut forecast = ForecastClient::new(FixedTransport(Ok(BODY.to_string())), RecordingPacer::default(), config.forecast.clone());
        let mut terrain = TerrainEstimator::new(&elevation, RecordingPacer::default(), Duration::ZERO);
        let mut cache = TerrainCache::new(4);

        let report = score_location(&config, &mut forecast, &mut terrain, &mut cache, today()).unwrap();

        assert_eq!(report.scores.len(), 3);
        assert!((report.terrain.aspect_deg - 0.0).abs() < 1e-6);
        assert!(report.terrain.slope_deg > 10.0);
        assert_eq!(report.best().map(|s| s.hour), Some(12));
        assert_eq!(elevation.calls.get(), 9);

        score_location(&config, &mut forecast, &mut terrain, &mut cache, today()).unwrap();
        assert_eq!(elevation.calls.get(), 9);
    }

    #[test]
    fn configured_terrain_skips_lookup() {
        let config = config("[scoring]\nslope_deg = 15.0\naspect_deg = 180.0\nzi = 1500.0\n");
        let elevation = SouthSlope { calls: Cell::new(0) };
        let mut forecast = ForecastClient::new(FixedTransport(Ok(BODY.to_string())), RecordingPacer::default(), config.forecast.clone());
        let mut terrain = TerrainEstimator::new(&elevation, RecordingPacer::default(), Duration::ZERO);
        let mut cache = TerrainCache::new(4);

        let report = score_location(&config, &mut forecast, &mut terrain, &mut cache, today()).unwrap();

        assert_eq!(elevation.calls.get(), 0);
        assert_eq!(report.terrain.aspect_deg, 180.0);
        assert_eq!(report.zi, 1500.0);
        assert!(report.scores[1].components.slope > 0.5);
    }

    #[test]
    fn malformed_hourly_block_gives_empty_scores() {
        let config = config("[scoring]\nslope_deg = 0.0\naspect_deg = 0.0\n");
        let elevation = SouthSlope { calls: Cell::new(0) };
        let body = r#"{"latitude": 46.0, "hourly": {"time": ["2024-06-01T12:00"], "wind_speed_10m": 4.0}}"#;
        let mut forecast = ForecastClient::new(FixedTransport(Ok(body.to_string())), RecordingPacer::default(), config.forecast.clone());
        let mut terrain = TerrainEstimator::new(&elevation, RecordingPacer::default(), Duration::ZERO);
        let mut cache = TerrainCache::new(4);

        let report = score_location(&config, &mut forecast, &mut terrain, &mut cache, today()).unwrap();

        assert!(report.scores.is_empty());
        assert!(report.best().is_none());
    }

    #[test]
    fn forecast_failure_is_fatal() {
        let config = config("[forecast]\nattempts = 2\nbackoff_ms = 0\n");
        let elevation = SouthSlope { calls: Cell::new(0) };
        let mut forecast = ForecastClient::new(
            FixedTransport(Err(TransportError::Status(503))),
            RecordingPacer::default(),
            config.forecast.clone(),
        );
        let mut terrain = TerrainEstimator::new(&elevation, RecordingPacer::default(), Duration::ZERO);
        let mut cache = TerrainCache::new(4);

        let result = score_location(&config, &mut forecast, &mut terrain, &mut cache, today());

        assert!(matches!(result, Err(ForecastError::FetchFailure { .. })));
        assert_eq!(elevation.calls.get(), 0);
    }
}
