use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One hourly variable as delivered by Open-Meteo, i.e. an array where any
/// single sample may be `null`
pub type HourlyValues = Option<Vec<Option<f64>>>;

/// The hourly block of a forecast (or archive) response.
///
/// All present arrays are index aligned with `time`. Any array may be missing
/// altogether, in which case the scoring driver applies per hour defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Hourly {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: HourlyValues,
    #[serde(default)]
    pub surface_pressure: HourlyValues,
    #[serde(default)]
    pub pressure_msl: HourlyValues,
    #[serde(default)]
    pub relative_humidity_2m: HourlyValues,
    #[serde(default)]
    pub wind_speed_10m: HourlyValues,
    #[serde(default)]
    pub wind_direction_10m: HourlyValues,
    #[serde(default)]
    pub cloud_cover: HourlyValues,
}

impl Hourly {
    /// Temperature in °C for the given hour
    pub fn temperature(&self, i: usize) -> Option<f64> {
        sample(&self.temperature_2m, i)
    }

    /// Pressure in hPa for the given hour, mean sea level pressure is preferred
    /// over surface pressure when both are present
    pub fn pressure(&self, i: usize) -> Option<f64> {
        sample(&self.pressure_msl, i).or_else(|| sample(&self.surface_pressure, i))
    }

    /// Relative humidity in % for the given hour
    pub fn relative_humidity(&self, i: usize) -> Option<f64> {
        sample(&self.relative_humidity_2m, i)
    }

    /// Wind speed in m/s for the given hour
    pub fn wind_speed(&self, i: usize) -> Option<f64> {
        sample(&self.wind_speed_10m, i)
    }

    /// Wind direction in degrees from north for the given hour
    pub fn wind_direction(&self, i: usize) -> Option<f64> {
        sample(&self.wind_direction_10m, i)
    }

    /// Cloud cover in % for the given hour
    pub fn cloud_cover(&self, i: usize) -> Option<f64> {
        sample(&self.cloud_cover, i)
    }
}

/// A fetched forecast series, immutable once received
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ForecastSeries {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_hourly")]
    pub hourly: Option<Hourly>,
}

/// Deserializes the hourly block, a block that does not have the expected shape is
/// logged and treated as missing rather than failing the whole document
fn lenient_hourly<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Hourly>, D::Error> {
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };

    match Hourly::deserialize(value) {
        Ok(hourly) => Ok(Some(hourly)),
        Err(e) => {
            warn!("ignoring malformed hourly block: {}", e);
            Ok(None)
        }
    }
}

/// Picks sample `i` from an optional array, missing arrays, short arrays and
/// null samples all give None
///
/// # Arguments
///
/// * 'values' - the hourly array
/// * 'i' - index of the hour
fn sample(values: &HourlyValues, i: usize) -> Option<f64> {
    values.as_ref().and_then(|v| v.get(i).copied().flatten())
}
