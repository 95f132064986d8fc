use std::time::Duration;
use crate::config::Config;
use crate::manager_elevation::Epqs;
use crate::manager_forecast::{ForecastClient, HttpTransport};
use crate::rate_limit::ThreadPacer;
use crate::terrain::{TerrainCache, TerrainEstimator};

/// Managers needed for a scoring pass
pub struct Mgr {
    pub forecast: ForecastClient<HttpTransport, ThreadPacer>,
    pub terrain: TerrainEstimator<Epqs, ThreadPacer>,
    pub cache: TerrainCache,
}

/// Instantiates forecast client, terrain estimator and terrain cache from configuration
///
/// # Arguments
///
/// * 'config' - the loaded configuration
pub fn init(config: &Config) -> Mgr {
    let transport = HttpTransport::new(Duration::from_millis(config.forecast.timeout_ms));
    let forecast = ForecastClient::new(transport, ThreadPacer, config.forecast.clone());

    let terrain = TerrainEstimator::new(
        Epqs::new(&config.terrain),
        ThreadPacer,
        Duration::from_millis(config.terrain.query_delay_ms),
    );

    Mgr { forecast, terrain, cache: TerrainCache::new(config.terrain.cache_capacity) }
}
