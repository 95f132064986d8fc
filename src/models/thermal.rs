use serde::{Deserialize, Serialize};

/// The four weighted sub scores behind a composite thermal score
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ScoreComponents {
    pub w: f64,
    #[serde(rename = "Ri")]
    pub ri: f64,
    pub wind: f64,
    pub slope: f64,
}

/// Result of scoring a single point in time
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PointScore {
    pub score: f64,
    pub wstar: f64,
    #[serde(rename = "B0")]
    pub b0: f64,
    #[serde(rename = "Ri")]
    pub ri: f64,
    pub components: ScoreComponents,
}

/// One scored forecast hour, as handed over to rendering
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ThermalScore {
    pub time: String,
    pub hour: u32,
    pub score: f64,
    pub wstar: f64,
    #[serde(rename = "B0")]
    pub b0: f64,
    #[serde(rename = "Ri")]
    pub ri: f64,
    pub insolation: f64,
    pub components: ScoreComponents,
}

impl ThermalScore {
    /// Combines a point score with the time information it was computed for
    ///
    /// # Arguments
    ///
    /// * 'time' - ISO timestamp of the hour
    /// * 'hour' - UTC hour of day used for the insolation estimate
    /// * 'insolation' - estimated insolation in W/m²
    /// * 'point' - the point score
    pub fn new(time: String, hour: u32, insolation: f64, point: PointScore) -> ThermalScore {
        ThermalScore {
            time,
            hour,
            score: point.score,
            wstar: point.wstar,
            b0: point.b0,
            ri: point.ri,
            insolation,
            components: point.components,
        }
    }
}
