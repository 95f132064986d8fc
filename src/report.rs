use std::fs;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use crate::config::GeoRef;
use crate::errors::ReportError;
use crate::models::terrain::TerrainProfile;
use crate::models::thermal::ThermalScore;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl From<GeoRef> for Location {
    fn from(geo: GeoRef) -> Self {
        Location { lat: geo.lat, lon: geo.long }
    }
}

/// Everything rendering needs for one location: where, when, terrain used and the
/// score per forecast hour
#[derive(Serialize, Debug, Clone)]
pub struct ThermalReport {
    pub created: DateTime<Utc>,
    pub location: Location,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub terrain: TerrainProfile,
    pub zi: f64,
    pub scores: Vec<ThermalScore>,
}

impl ThermalReport {
    /// The hour with the highest score, if any
    pub fn best(&self) -> Option<&ThermalScore> {
        self.scores.iter().max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// Saves a report as pretty printed json
///
/// # Arguments
///
/// * 'path' - file to write
/// * 'report' - the report to save
pub fn save_report(path: &str, report: &ThermalReport) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;

    Ok(())
}
