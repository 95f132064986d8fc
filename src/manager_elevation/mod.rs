pub mod errors;

use std::time::Duration;
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use ureq::Agent;
use crate::config::TerrainConfig;
use crate::manager_elevation::errors::ElevationError;

/// A point elevation query service
pub trait ElevationService {
    /// Elevation in meters at a coordinate, None on any failure
    fn get_elevation(&self, lat: f64, lon: f64) -> Option<f64>;
}

#[derive(Deserialize)]
struct PointQuery {
    #[serde(default)]
    value: Option<Value>,
}

/// Client for the USGS Elevation Point Query Service
pub struct Epqs {
    agent: Agent,
    url: String,
}

impl Epqs {
    /// Returns a new Epqs client
    ///
    /// # Arguments
    ///
    /// * 'config' - terrain configuration holding endpoint and timeout
    pub fn new(config: &TerrainConfig) -> Self {
        let agent_config = Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(config.timeout_ms)))
            .build();

        Self { agent: agent_config.into(), url: config.elevation_url.clone() }
    }

    /// Queries the service for one coordinate, a response without a usable value is
    /// reported as an error
    ///
    /// # Arguments
    ///
    /// * 'lat' - latitude
    /// * 'lon' - longitude
    fn query(&self, lat: f64, lon: f64) -> Result<f64, ElevationError> {
        let json = self.agent
            .get(&self.url)
            .query("x", lon.to_string())
            .query("y", lat.to_string())
            .query("units", "Meters")
            .query("wkid", "4326")
            .call()?
            .body_mut()
            .read_to_string()?;

        parse_elevation(&json)
    }
}

impl ElevationService for Epqs {
    fn get_elevation(&self, lat: f64, lon: f64) -> Option<f64> {
        match self.query(lat, lon) {
            Ok(elevation) => Some(elevation),
            Err(e) => {
                warn!("elevation query for {:.5},{:.5} failed: {}", lat, lon, e);
                None
            }
        }
    }
}

/// Extracts the elevation from a point query response. The value may come as a
/// number or as a numeric string.
///
/// # Arguments
///
/// * 'json' - the response body
fn parse_elevation(json: &str) -> Result<f64, ElevationError> {
    let point: PointQuery = serde_json::from_str(json)?;

    let elevation = match point.value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    elevation
        .filter(|e| e.is_finite())
        .ok_or_else(|| ElevationError(format!("no elevation value in response: {}", json)))
}
