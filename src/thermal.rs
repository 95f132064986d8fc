use chrono::{DateTime, NaiveDateTime, Timelike};
use log::warn;
use crate::config::ScoringOptions;
use crate::models::forecast::ForecastSeries;
use crate::models::thermal::{PointScore, ScoreComponents, ThermalScore};

/// Standard gravity (m/s²)
const G: f64 = 9.80665;

/// Gas constant over specific heat at constant pressure for dry air
const R_OVER_CP: f64 = 0.286;

/// Reference pressure for potential temperature (Pa)
const P0: f64 = 100000.0;

/// Ratio of molecular weights of water vapor and dry air
const EPSILON: f64 = 0.622;

/// Air density used for the kinematic heat flux (kg/m³)
const RHO: f64 = 1.225;

/// Specific heat of dry air at constant pressure (J/(kg·K))
const CP: f64 = 1004.0;

/// Guard against division by (near) zero
const TINY: f64 = 1e-12;

/// Richardson number returned when no gradient can be formed, i.e. maximally stable
pub const RI_STABLE: f64 = 1e6;

pub const DEFAULT_ALBEDO: f64 = 0.2;
pub const DEFAULT_SENSIBLE_FRACTION: f64 = 0.5;
pub const WIND_CENTER: f64 = 4.0;
pub const WIND_SIGMA: f64 = 2.0;

/// Composite weights for convective velocity, stability, wind and slope
const WEIGHTS: [f64; 4] = [0.45, 0.25, 0.2, 0.1];

/// Richardson number at which the stability sub score reaches zero
const RI_CRITICAL: f64 = 0.5;

/// Convective velocity where the w* sub score saturates (m/s)
const WSTAR_SATURATION: f64 = 2.0;

/// Defaults applied to hours missing a variable
const DEFAULT_TEMPERATURE_C: f64 = 15.0;
const DEFAULT_PRESSURE_HPA: f64 = 1013.25;
const DEFAULT_RH_PCT: f64 = 50.0;

/// One level of a vertical profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileLevel {
    pub t_k: f64,
    pub p_pa: f64,
    pub z_m: f64,
    pub u: f64,
    pub v: f64,
}

/// A vertical profile with the surface at index 0
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerticalProfile {
    pub levels: Vec<ProfileLevel>,
}

impl VerticalProfile {
    /// Synthesizes a two level profile from surface values only.
    ///
    /// This is a fixed approximation and not a physical model: level 1 sits at 1000 m,
    /// is 2 K colder than the surface, has 0.9 times the surface pressure and carries
    /// 80% of the surface wind.
    ///
    /// # Arguments
    ///
    /// * 't_k' - surface temperature in K
    /// * 'p_pa' - surface pressure in Pa
    /// * 'wind_speed' - surface wind speed in m/s
    /// * 'wind_dir' - surface wind direction in degrees from north
    pub fn synthetic_two_level(t_k: f64, p_pa: f64, wind_speed: f64, wind_dir: f64) -> VerticalProfile {
        let u = wind_speed * wind_dir.to_radians().cos();
        let v = wind_speed * wind_dir.to_radians().sin();

        VerticalProfile {
            levels: vec![
                ProfileLevel { t_k, p_pa, z_m: 0.0, u, v },
                ProfileLevel { t_k: t_k - 2.0, p_pa: p_pa * 0.9, z_m: 1000.0, u: u * 0.8, v: v * 0.8 },
            ],
        }
    }

    /// Richardson number between the two lowest levels of the profile
    pub fn richardson(&self) -> f64 {
        let theta = self.levels.iter().map(|l| potential_temperature(l.t_k, l.p_pa)).collect::<Vec<f64>>();
        let u = self.levels.iter().map(|l| l.u).collect::<Vec<f64>>();
        let v = self.levels.iter().map(|l| l.v).collect::<Vec<f64>>();
        let z = self.levels.iter().map(|l| l.z_m).collect::<Vec<f64>>();

        gradient_richardson(&theta, &u, &v, &z)
    }
}

/// Everything needed to score a single point in time
#[derive(Debug, Clone, PartialEq)]
pub struct PointInputs {
    pub t_surface: f64,
    pub p_surface: f64,
    pub rh_surface: f64,
    pub wind_speed: f64,
    pub wind_dir: f64,
    pub profile: VerticalProfile,
    pub slope_deg: f64,
    pub aspect_deg: f64,
    pub insolation: f64,
    pub zi: f64,
}

/// Potential temperature (K)
///
/// # Arguments
///
/// * 't' - temperature in K
/// * 'p' - pressure in Pa
pub fn potential_temperature(t: f64, p: f64) -> f64 {
    t * (P0 / p).powf(R_OVER_CP)
}

/// Mixing ratio (kg/kg) from relative humidity, saturation vapor pressure is taken
/// from the Tetens approximation
///
/// # Arguments
///
/// * 't' - temperature in K
/// * 'p' - pressure in Pa
/// * 'rh' - relative humidity as fraction 0..1
pub fn mixing_ratio_from_rh(t: f64, p: f64, rh: f64) -> f64 {
    let t_c = t - 273.15;
    let es = 6.112 * ((17.67 * t_c) / (t_c + 243.5)).exp() * 100.0;
    let e = rh * es;

    EPSILON * e / (p - e + TINY)
}

/// Virtual potential temperature (K)
///
/// # Arguments
///
/// * 't' - temperature in K
/// * 'p' - pressure in Pa
/// * 'r' - mixing ratio in kg/kg
pub fn virtual_potential_temperature(t: f64, p: f64, r: f64) -> f64 {
    potential_temperature(t, p) * (1.0 + 0.61 * r)
}

/// Rough surface buoyancy flux from insolation.
///
/// A share of the absorbed radiation is assumed to become sensible heat, which is
/// turned into a kinematic heat flux and then into buoyancy units.
///
/// # Arguments
///
/// * 'insolation' - incoming solar radiation in W/m²
/// * 'albedo' - surface albedo
/// * 'theta_v0' - surface virtual potential temperature in K
/// * 'sensible_frac' - fraction of net radiation going to sensible heat
pub fn estimate_b0_from_insolation(insolation: f64, albedo: f64, theta_v0: f64, sensible_frac: f64) -> f64 {
    let h = insolation * (1.0 - albedo) * sensible_frac;
    let w_theta = h / (RHO * CP + TINY);

    G / (theta_v0 + TINY) * w_theta
}

/// Deardorff convective velocity scale w* (m/s), zero when the surface is not
/// a heat source or no mixed layer depth is given
///
/// # Arguments
///
/// * 'b0' - surface buoyancy flux
/// * 'zi' - mixed layer depth in m
pub fn convective_velocity_scale(b0: f64, zi: f64) -> f64 {
    if b0 <= 0.0 || zi <= 0.0 || zi.is_nan() {
        return 0.0;
    }

    (b0 * zi).cbrt()
}

/// Bulk Richardson number between the surface (index 0) and the first level above it.
///
/// Returns `RI_STABLE` if fewer than two levels are given.
///
/// # Arguments
///
/// * 'theta' - potential temperature per level in K
/// * 'u' - east/west wind component per level
/// * 'v' - north/south wind component per level
/// * 'z' - height per level in m
pub fn gradient_richardson(theta: &[f64], u: &[f64], v: &[f64], z: &[f64]) -> f64 {
    let levels = theta.len().min(u.len()).min(v.len()).min(z.len());
    if levels < 2 {
        return RI_STABLE;
    }

    let dz = z[1] - z[0];
    let dtheta = theta[1] - theta[0];
    let du = (u[1] - u[0]).hypot(v[1] - v[0]);
    let shear = (du / (dz + TINY)).powi(2);

    (G / (theta[0] + TINY)) * (dtheta / (dz + TINY)) / (shear + TINY)
}

/// Bell shaped favorability of a wind speed, 1 at `center` and falling off on both sides
///
/// # Arguments
///
/// * 'u' - wind speed in m/s
/// * 'center' - most favorable wind speed
/// * 'sigma' - width of the bell
pub fn wind_favorability_score(u: f64, center: f64, sigma: f64) -> f64 {
    (-0.5 * ((u - center) / sigma).powi(2)).exp()
}

/// Upslope alignment factor in 0..1, rewarding wind blowing along the slope aspect and
/// saturating with slope steepness
///
/// # Arguments
///
/// * 'aspect_deg' - slope aspect
/// * 'wind_dir_deg' - wind direction
/// * 'slope_deg' - slope steepness
/// * 'sun_alignment' - extra multiplier, 1 for no effect
pub fn slope_aspect_factor(aspect_deg: f64, wind_dir_deg: f64, slope_deg: f64, sun_alignment: f64) -> f64 {
    let align = (wind_dir_deg - aspect_deg).to_radians().cos().max(0.0);

    align * (slope_deg / 10.0).tanh() * sun_alignment
}

/// Computes the composite thermal score for a single point in time
///
/// # Arguments
///
/// * 'inputs' - surface values, vertical profile, terrain and forcing
pub fn thermal_score_single_point(inputs: &PointInputs) -> PointScore {
    let r = mixing_ratio_from_rh(inputs.t_surface, inputs.p_surface, inputs.rh_surface);
    let theta_v0 = virtual_potential_temperature(inputs.t_surface, inputs.p_surface, r);
    let b0 = estimate_b0_from_insolation(inputs.insolation, DEFAULT_ALBEDO, theta_v0, DEFAULT_SENSIBLE_FRACTION);
    let wstar = convective_velocity_scale(b0, inputs.zi);
    let ri = inputs.profile.richardson();

    let components = ScoreComponents {
        w: (wstar / WSTAR_SATURATION).min(1.0),
        ri: if ri <= 0.0 { 1.0 } else { (1.0 - ri / RI_CRITICAL).max(0.0) },
        wind: wind_favorability_score(inputs.wind_speed, WIND_CENTER, WIND_SIGMA),
        slope: slope_aspect_factor(inputs.aspect_deg, inputs.wind_dir, inputs.slope_deg, 1.0),
    };

    let s = WEIGHTS[0] * components.w
        + WEIGHTS[1] * components.ri
        + WEIGHTS[2] * components.wind
        + WEIGHTS[3] * components.slope;

    PointScore {
        score: if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) },
        wstar,
        b0,
        ri,
        components,
    }
}

/// Approximate solar elevation in degrees for a UTC hour, peaking at 60° at 12 UTC
///
/// # Arguments
///
/// * 'hour' - hour of day
pub fn estimate_solar_elevation(hour: u32) -> f64 {
    let hour_angle = (hour as f64 - 12.0) * 15.0;

    (60.0 * hour_angle.to_radians().cos()).max(0.0)
}

/// Estimated insolation in W/m² for a UTC hour attenuated by cloud cover
///
/// # Arguments
///
/// * 'hour' - hour of day
/// * 'cloud_cover' - cloud cover in %
pub fn estimate_insolation(hour: u32, cloud_cover: f64) -> f64 {
    let cloud_factor = 1.0 - (cloud_cover / 100.0) * 0.7;

    (1000.0 * estimate_solar_elevation(hour).to_radians().sin() * cloud_factor).max(0.0)
}

/// Scores every hour of a forecast series, one ThermalScore per input hour and in input order.
///
/// A series without an hourly block gives an empty result.
///
/// # Arguments
///
/// * 'forecast' - the forecast series
/// * 'options' - static terrain shape and mixed layer depth
pub fn calculate_thermal_time_series(forecast: &ForecastSeries, options: &ScoringOptions) -> Vec<ThermalScore> {
    let Some(hourly) = forecast.hourly.as_ref() else {
        warn!("forecast has no hourly data, nothing to score");
        return Vec::new();
    };

    hourly.time.iter().enumerate().map(|(i, time)| {
        let t_k = hourly.temperature(i).unwrap_or(DEFAULT_TEMPERATURE_C) + 273.15;
        let p_pa = hourly.pressure(i).unwrap_or(DEFAULT_PRESSURE_HPA) * 100.0;
        let rh = hourly.relative_humidity(i).unwrap_or(DEFAULT_RH_PCT) / 100.0;
        let wind_speed = hourly.wind_speed(i).unwrap_or(0.0);
        let wind_dir = hourly.wind_direction(i).unwrap_or(0.0);

        let hour = utc_hour(time).unwrap_or_else(|| {
            warn!("unparseable forecast time '{}', assuming hour 0", time);
            0
        });
        let insolation = estimate_insolation(hour, hourly.cloud_cover(i).unwrap_or(0.0));

        let inputs = PointInputs {
            t_surface: t_k,
            p_surface: p_pa,
            rh_surface: rh,
            wind_speed,
            wind_dir,
            profile: VerticalProfile::synthetic_two_level(t_k, p_pa, wind_speed, wind_dir),
            slope_deg: options.slope_deg,
            aspect_deg: options.aspect_deg,
            insolation,
            zi: options.zi,
        };

        ThermalScore::new(time.clone(), hour, insolation, thermal_score_single_point(&inputs))
    }).collect()
}

/// Hour of day of an ISO timestamp. Timestamps without offset are taken as UTC since
/// forecasts are always requested in UTC.
///
/// # Arguments
///
/// * 'time' - the timestamp
fn utc_hour(time: &str) -> Option<u32> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(time) {
        return Some(dt.to_utc().hour());
    }

    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(time, f).ok())
        .map(|dt| dt.hour())
}
