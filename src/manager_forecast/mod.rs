pub mod errors;

use std::time::Duration;
use chrono::{NaiveDate, TimeDelta};
use log::{info, warn};
use ureq::Agent;
use crate::config::{FetchConfig, ShrinkOn};
use crate::manager_forecast::errors::{ForecastError, TransportError};
use crate::models::forecast::ForecastSeries;
use crate::rate_limit::Pacer;

/// Hourly variables requested from the weather API
const HOURLY_VARIABLES: &str =
    "temperature_2m,surface_pressure,pressure_msl,relative_humidity_2m,wind_speed_10m,wind_direction_10m,cloud_cover";

/// A plain HTTP GET returning the response body
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, TransportError>;
}

/// Transport backed by a ureq agent where every call is bounded by a global timeout
pub struct HttpTransport {
    agent: Agent,
}

impl HttpTransport {
    /// Returns a new HttpTransport
    ///
    /// # Arguments
    ///
    /// * 'timeout' - max duration of each single call
    pub fn new(timeout: Duration) -> HttpTransport {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();

        HttpTransport { agent: config.into() }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, TransportError> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(*key, value);
        }

        let json = request
            .call()?
            .body_mut()
            .read_to_string()?;

        Ok(json)
    }
}

/// Which of the two weather endpoints a request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Present and future, i.e. forecasts
    Forecast,
    /// Past dates only
    Archive,
}

/// Picks endpoint given the end of the requested window, anything reaching today or
/// later needs the forecast endpoint.
///
/// # Arguments
///
/// * 'end_date' - last date of the window
/// * 'today' - the current UTC date
pub fn select_endpoint(end_date: NaiveDate, today: NaiveDate) -> Endpoint {
    if end_date >= today {
        Endpoint::Forecast
    } else {
        Endpoint::Archive
    }
}

/// Narrowed window used on retries, `days` days starting at `start_date` but never
/// past the original end date
///
/// # Arguments
///
/// * 'start_date' - first date of the original window
/// * 'end_date' - last date of the original window
/// * 'days' - length of the narrowed window
pub fn shrunk_window(start_date: NaiveDate, end_date: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    let shrunk_end = start_date + TimeDelta::days(days.max(1) as i64 - 1);

    (start_date, shrunk_end.min(end_date))
}

/// Resilient client for hourly forecast and historical weather data
pub struct ForecastClient<T: Transport, P: Pacer> {
    transport: T,
    pacer: P,
    config: FetchConfig,
}

impl<T: Transport, P: Pacer> ForecastClient<T, P> {
    /// Returns a new ForecastClient
    ///
    /// # Arguments
    ///
    /// * 'transport' - transport doing the HTTP calls
    /// * 'pacer' - pacer used for backoff between attempts
    /// * 'config' - retry and endpoint configuration
    pub fn new(transport: T, pacer: P, config: FetchConfig) -> Self {
        Self { transport, pacer, config }
    }

    /// Fetches hourly weather for a coordinate and date window (both inclusive), `today`
    /// decides between forecast and archive endpoint.
    ///
    /// Attempt 1 asks for the full window, every later attempt for the narrowed window
    /// (see `shrunk_window`) on the same endpoint. After failed attempt n the client
    /// pauses n times the backoff base. When all attempts fail the last transport error
    /// is returned, partial data is never returned.
    ///
    /// # Arguments
    ///
    /// * 'lat' - latitude
    /// * 'lon' - longitude
    /// * 'start_date' - first date
    /// * 'end_date' - last date
    /// * 'today' - the current UTC date
    pub fn fetch(&mut self, lat: f64, lon: f64, start_date: NaiveDate, end_date: NaiveDate, today: NaiveDate)
        -> Result<ForecastSeries, ForecastError> {

        let endpoint = select_endpoint(end_date, today);
        let url = match endpoint {
            Endpoint::Forecast => self.config.forecast_url.clone(),
            Endpoint::Archive => self.config.archive_url.clone(),
        };
        let attempts = self.config.attempts.max(1);

        let mut window = (start_date, end_date);
        let mut attempt: u32 = 1;
        loop {
            match self.transport.get(&url, &query(lat, lon, window)) {
                Ok(json) => {
                    let series: ForecastSeries = serde_json::from_str(&json)?;
                    info!("fetched {:?} data for {} - {} on attempt {}", endpoint, window.0, window.1, attempt);
                    return Ok(series);
                },
                Err(e) if attempt >= attempts => {
                    warn!("attempt {}/{} against {:?} failed, giving up: {}", attempt, attempts, endpoint, e);
                    return Err(ForecastError::FetchFailure { attempts, source: e });
                },
                Err(e) => {
                    let backoff = Duration::from_millis(self.config.backoff_ms * attempt as u64);
                    warn!("attempt {}/{} against {:?} failed, retrying in {:?}: {}", attempt, attempts, endpoint, backoff, e);

                    if self.config.shrink_on == ShrinkOn::Any || e.is_timeout() {
                        window = shrunk_window(start_date, end_date, self.config.shrink_window_days);
                    }
                    self.pacer.pause(backoff);
                    attempt += 1;
                },
            }
        }
    }
}

/// Query parameters for one request
///
/// # Arguments
///
/// * 'lat' - latitude
/// * 'lon' - longitude
/// * 'window' - first and last date
fn query(lat: f64, lon: f64, window: (NaiveDate, NaiveDate)) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", lat.to_string()),
        ("longitude", lon.to_string()),
        ("start_date", window.0.format("%Y-%m-%d").to_string()),
        ("end_date", window.1.format("%Y-%m-%d").to_string()),
        ("hourly", HOURLY_VARIABLES.to_string()),
        ("timezone", "UTC".to_string()),
    ]
}
