use std::fs;
use chrono::NaiveDate;
use log::LevelFilter;
use serde::Deserialize;
use crate::errors::ConfigError;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoRef {
    pub lat: f64,
    pub long: f64,
}

/// Date window to score, both dates inclusive. Missing dates mean today and
/// two days ahead respectively.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Window {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Which failures make a retry narrow the requested date window
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShrinkOn {
    /// Every retry narrows the window
    #[default]
    Any,
    /// Only retries after a timeout narrow the window
    Timeout,
}

/// Forecast fetch policy
///
/// * 'attempts' - number of tries, at least 1 (default 2)
/// * 'timeout_ms' - bound on each single HTTP call (default 8000)
/// * 'backoff_ms' - linear backoff base, pause after attempt n is n times this (default 500)
/// * 'shrink_window_days' - length of the narrowed window used on retries (default 5)
/// * 'shrink_on' - which failures narrow the window (default any)
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct FetchConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_shrink_window_days")]
    pub shrink_window_days: u32,
    #[serde(default)]
    pub shrink_on: ShrinkOn,
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            attempts: default_attempts(),
            timeout_ms: default_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            shrink_window_days: default_shrink_window_days(),
            shrink_on: ShrinkOn::default(),
            forecast_url: default_forecast_url(),
            archive_url: default_archive_url(),
        }
    }
}

/// Terrain sampling policy
///
/// * 'grid_size_m' - distance from center to each grid neighbor (default 100)
/// * 'query_delay_ms' - pause between two elevation queries (default 100)
/// * 'cache_capacity' - max number of cached terrain profiles (default 256)
/// * 'timeout_ms' - bound on each elevation query (default 5000)
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct TerrainConfig {
    #[serde(default = "default_grid_size_m")]
    pub grid_size_m: f64,
    #[serde(default = "default_query_delay_ms")]
    pub query_delay_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_elevation_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_elevation_url")]
    pub elevation_url: String,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig {
            grid_size_m: default_grid_size_m(),
            query_delay_ms: default_query_delay_ms(),
            cache_capacity: default_cache_capacity(),
            timeout_ms: default_elevation_timeout_ms(),
            elevation_url: default_elevation_url(),
        }
    }
}

/// Scoring parameters. Slope and aspect given here bypass the terrain lookup.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ScoringParameters {
    #[serde(default = "default_zi")]
    pub zi: f64,
    pub slope_deg: Option<f64>,
    pub aspect_deg: Option<f64>,
}

impl Default for ScoringParameters {
    fn default() -> Self {
        ScoringParameters { zi: default_zi(), slope_deg: None, aspect_deg: None }
    }
}

/// Static inputs to the time series driver, defaults are flat terrain facing
/// north and a 1000 m mixed layer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringOptions {
    pub slope_deg: f64,
    pub aspect_deg: f64,
    pub zi: f64,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        ScoringOptions { slope_deg: 0.0, aspect_deg: 0.0, zi: default_zi() }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Files {
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Files {
    fn default() -> Self {
        Files { output: default_output() }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct General {
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: LevelFilter,
    #[serde(default = "default_log_to_stdout")]
    pub log_to_stdout: bool,
}

impl Default for General {
    fn default() -> Self {
        General {
            log_path: default_log_path(),
            log_level: default_log_level(),
            log_to_stdout: default_log_to_stdout(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub location: GeoRef,
    #[serde(default)]
    pub window: Window,
    #[serde(default)]
    pub forecast: FetchConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub scoring: ScoringParameters,
    #[serde(default)]
    pub files: Files,
    #[serde(default)]
    pub general: General,
}

fn default_attempts() -> u32 { 2 }
fn default_timeout_ms() -> u64 { 8000 }
fn default_backoff_ms() -> u64 { 500 }
fn default_shrink_window_days() -> u32 { 5 }
fn default_forecast_url() -> String { "https://api.open-meteo.com/v1/forecast".to_string() }
fn default_archive_url() -> String { "https://archive-api.open-meteo.com/v1/archive".to_string() }
fn default_grid_size_m() -> f64 { 100.0 }
fn default_query_delay_ms() -> u64 { 100 }
fn default_cache_capacity() -> usize { 256 }
fn default_elevation_timeout_ms() -> u64 { 5000 }
fn default_elevation_url() -> String { "https://epqs.nationalmap.gov/v1/json".to_string() }
fn default_zi() -> f64 { 1000.0 }
fn default_output() -> String { "thermal_scores.json".to_string() }
fn default_log_path() -> String { "thermalcast.log".to_string() }
fn default_log_level() -> LevelFilter { LevelFilter::Info }
fn default_log_to_stdout() -> bool { true }

/// Loads the configuration file and returns a struct with all configuration items
///
/// # Arguments
///
/// * 'config_path' - path to the configuration file
pub fn load_config(config_path: &str) -> Result<Config, ConfigError> {
    let toml = fs::read_to_string(config_path)?;

    parse_config(&toml)
}

/// Parses and validates configuration given as a TOML string
///
/// # Arguments
///
/// * 'toml' - the configuration document
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml)?;
    validate(&config)?;

    Ok(config)
}

/// Checks value ranges that serde can't express
///
/// # Arguments
///
/// * 'config' - the configuration to check
fn validate(config: &Config) -> Result<(), ConfigError> {
    if !(-90.0..=90.0).contains(&config.location.lat) || !(-180.0..=180.0).contains(&config.location.long) {
        return Err(ConfigError::from("location outside valid lat/long range"));
    }
    if config.forecast.attempts < 1 {
        return Err(ConfigError::from("forecast attempts must be at least 1"));
    }
    if config.forecast.shrink_window_days < 1 {
        return Err(ConfigError::from("forecast shrink window must be at least 1 day"));
    }
    if !(config.terrain.grid_size_m > 0.0) {
        return Err(ConfigError::from("terrain grid size must be positive"));
    }
    if config.terrain.cache_capacity < 1 {
        return Err(ConfigError::from("terrain cache capacity must be at least 1"));
    }
    if let (Some(start), Some(end)) = (config.window.start_date, config.window.end_date) {
        if start > end {
            return Err(ConfigError::from("window start date is after end date"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_documented_defaults() {
        let config = parse_config("[location]\nlat = 46.5\nlong = 7.9\n").unwrap();

        assert_eq!(config.forecast.attempts, 2);
        assert_eq!(config.forecast.timeout_ms, 8000);
        assert_eq!(config.forecast.backoff_ms, 500);
        assert_eq!(config.forecast.shrink_window_days, 5);
        assert_eq!(config.forecast.shrink_on, ShrinkOn::Any);
        assert_eq!(config.terrain.grid_size_m, 100.0);
        assert_eq!(config.terrain.query_delay_ms, 100);
        assert_eq!(config.scoring.zi, 1000.0);
        assert!(config.scoring.slope_deg.is_none());
        assert_eq!(config.window, Window::default());
        assert_eq!(config.general.log_level, LevelFilter::Info);
    }

    #[test]
    fn full_config_is_read() {
        let toml = r#"
            [location]
            lat = 46.5
            long = 7.9

            [window]
            start_date = "2024-06-01"
            end_date = "2024-06-10"

            [forecast]
            attempts = 4
            shrink_on = "timeout"

            [terrain]
            grid_size_m = 50.0
            cache_capacity = 8

            [scoring]
            zi = 1500.0
            slope_deg = 12.0
            aspect_deg = 180.0

            [general]
            log_path = "/tmp/thermal.log"
            log_level = "debug"
            log_to_stdout = false
        "#;

        let config = parse_config(toml).unwrap();

        assert_eq!(config.window.start_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(config.forecast.attempts, 4);
        assert_eq!(config.forecast.shrink_on, ShrinkOn::Timeout);
        assert_eq!(config.terrain.grid_size_m, 50.0);
        assert_eq!(config.terrain.cache_capacity, 8);
        assert_eq!(config.scoring.slope_deg, Some(12.0));
        assert_eq!(config.general.log_level, LevelFilter::Debug);
        assert!(!config.general.log_to_stdout);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(parse_config("[location]\nlat = 95.0\nlong = 0.0\n"), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            parse_config("[location]\nlat = 1.0\nlong = 0.0\n[forecast]\nattempts = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("[location]\nlat = 1.0\nlong = 0.0\n[window]\nstart_date = \"2024-06-05\"\nend_date = \"2024-06-01\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(parse_config("[location]\nlat = 1.0\n"), Err(ConfigError::Parse(_))));
    }
}
