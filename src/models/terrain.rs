use serde::{Deserialize, Serialize};

/// A single elevation query result, elevation is None if the upstream query failed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSample {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
}

/// Local terrain shape at a coordinate
///
/// * 'slope_deg' - degrees from horizontal
/// * 'aspect_deg' - compass direction the slope faces, 0 = north, clockwise
/// * 'elevation' - center elevation in meters
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TerrainProfile {
    pub slope_deg: f64,
    pub aspect_deg: f64,
    pub elevation: f64,
}
