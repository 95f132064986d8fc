use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use log::{debug, info};
use crate::manager_elevation::ElevationService;
use crate::models::terrain::{TerrainProfile, TerrainSample};
use crate::rate_limit::{Pacer, Paced};

/// Meters per degree latitude in the flat earth approximation
const METERS_PER_DEGREE: f64 = 111000.0;

/// One node of the 3x3 sampling grid, 'i' steps north and 'j' steps east
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub i: i8,
    pub j: i8,
    pub lat: f64,
    pub lon: f64,
}

/// Builds the 3x3 sampling grid around a coordinate.
///
/// Meters are converted to degrees with a local flat earth approximation
/// (111 km per degree latitude, shrunk by cos(lat) for longitude), which breaks down
/// close to the poles.
///
/// # Arguments
///
/// * 'lat' - center latitude
/// * 'lon' - center longitude
/// * 'grid_size_m' - distance from center to neighbors in meters
pub fn sampling_grid(lat: f64, lon: f64, grid_size_m: f64) -> Vec<GridPoint> {
    let lat_delta = grid_size_m / METERS_PER_DEGREE;
    let lon_delta = grid_size_m / (METERS_PER_DEGREE * lat.to_radians().cos());

    let mut points = Vec::with_capacity(9);
    for i in -1i8..=1 {
        for j in -1i8..=1 {
            points.push(GridPoint {
                i,
                j,
                lat: lat + i as f64 * lat_delta,
                lon: lon + j as f64 * lon_delta,
            });
        }
    }

    points
}

/// Derives slope, aspect and center elevation from grid samples using central differences
/// over the four cardinal neighbors.
///
/// A missing neighbor counts as being at center elevation and a missing center counts
/// as 0 m, so failures only flatten the result.
///
/// # Arguments
///
/// * 'samples' - grid points with their (optional) elevations
/// * 'grid_size_m' - distance from center to neighbors in meters
pub fn profile_from_samples(samples: &[(GridPoint, TerrainSample)], grid_size_m: f64) -> TerrainProfile {
    let elevation_at = |i: i8, j: i8| samples
        .iter()
        .find(|(p, _)| p.i == i && p.j == j)
        .and_then(|(_, s)| s.elevation);

    let center = elevation_at(0, 0).unwrap_or(0.0);
    let east = elevation_at(0, 1).unwrap_or(center);
    let west = elevation_at(0, -1).unwrap_or(center);
    let north = elevation_at(1, 0).unwrap_or(center);
    let south = elevation_at(-1, 0).unwrap_or(center);

    let dz_dx = (east - west) / (2.0 * grid_size_m);
    let dz_dy = (north - south) / (2.0 * grid_size_m);

    let slope_deg = dz_dx.hypot(dz_dy).atan().to_degrees();
    let aspect_deg = dz_dx.atan2(dz_dy).to_degrees().rem_euclid(360.0);

    TerrainProfile {
        slope_deg,
        // rem_euclid may round up to exactly 360 for tiny negative angles
        aspect_deg: if aspect_deg >= 360.0 { 0.0 } else { aspect_deg },
        elevation: center,
    }
}

/// Cache key, the coordinate rounded to 4 decimals (~11 m) plus grid size
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(lat: f64, lon: f64, grid_size_m: f64) -> CacheKey {
        CacheKey(format!("{:.4},{:.4},{}", lat, lon, grid_size_m))
    }
}

/// Bounded least recently used cache of terrain profiles
pub struct TerrainCache {
    capacity: usize,
    entries: HashMap<CacheKey, TerrainProfile>,
    order: VecDeque<CacheKey>,
}

impl TerrainCache {
    /// Returns an empty cache holding at most `capacity` profiles (at least 1)
    pub fn new(capacity: usize) -> TerrainCache {
        TerrainCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up a profile and marks it as most recently used
    pub fn get(&mut self, key: &CacheKey) -> Option<TerrainProfile> {
        let profile = *self.entries.get(key)?;
        self.touch(key);

        Some(profile)
    }

    /// Stores a profile, evicting the least recently used one when full
    pub fn insert(&mut self, key: CacheKey, profile: TerrainProfile) {
        if self.entries.insert(key.clone(), profile).is_some() {
            self.touch(&key);
            return;
        }

        self.order.push_back(key);
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => { self.entries.remove(&oldest); },
                None => break,
            }
        }
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

/// Estimates local terrain shape from a small grid of point elevation queries
pub struct TerrainEstimator<E: ElevationService, P: Pacer> {
    service: E,
    pacer: P,
    query_delay: Duration,
    queried: bool,
}

impl<E: ElevationService, P: Pacer> TerrainEstimator<E, P> {
    /// Returns a new TerrainEstimator
    ///
    /// # Arguments
    ///
    /// * 'service' - the elevation query service
    /// * 'pacer' - pacer spacing out the queries
    /// * 'query_delay' - pause between two consecutive queries
    pub fn new(service: E, pacer: P, query_delay: Duration) -> Self {
        Self { service, pacer, query_delay, queried: false }
    }

    /// Samples the 3x3 grid strictly one query at a time, with a fixed pause between
    /// any two queries issued by this estimator (also across calls), and derives the
    /// terrain profile. Never fails, failed queries just make the result flatter.
    ///
    /// # Arguments
    ///
    /// * 'lat' - latitude
    /// * 'lon' - longitude
    /// * 'grid_size_m' - distance from center to neighbors in meters
    pub fn get_terrain_data(&mut self, lat: f64, lon: f64, grid_size_m: f64) -> TerrainProfile {
        let grid = sampling_grid(lat, lon, grid_size_m);
        let service = &self.service;
        let paced = if self.queried {
            Paced::continuing(grid.into_iter(), &mut self.pacer, self.query_delay)
        } else {
            Paced::new(grid.into_iter(), &mut self.pacer, self.query_delay)
        };

        let samples = paced
            .map(|p| {
                let sample = TerrainSample { lat: p.lat, lon: p.lon, elevation: service.get_elevation(p.lat, p.lon) };
                debug!("elevation at {:.5},{:.5}: {:?}", sample.lat, sample.lon, sample.elevation);
                (p, sample)
            })
            .collect::<Vec<(GridPoint, TerrainSample)>>();
        self.queried |= !samples.is_empty();

        let missing = samples.iter().filter(|(_, s)| s.elevation.is_none()).count();
        let profile = profile_from_samples(&samples, grid_size_m);
        info!("terrain at {:.4},{:.4}: slope {:.1}°, aspect {:.0}°, elevation {:.0} m ({} of 9 samples missing)",
            lat, lon, profile.slope_deg, profile.aspect_deg, profile.elevation, missing);

        profile
    }

    /// Same as get_terrain_data but memoized in the given cache
    ///
    /// # Arguments
    ///
    /// * 'cache' - the cache to use
    /// * 'lat' - latitude
    /// * 'lon' - longitude
    /// * 'grid_size_m' - distance from center to neighbors in meters
    pub fn get_terrain_data_cached(&mut self, cache: &mut TerrainCache, lat: f64, lon: f64, grid_size_m: f64) -> TerrainProfile {
        let key = CacheKey::new(lat, lon, grid_size_m);
        if let Some(profile) = cache.get(&key) {
            debug!("terrain cache hit for {:?}", key);
            return profile;
        }

        let profile = self.get_terrain_data(lat, lon, grid_size_m);
        cache.insert(key, profile);

        profile
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use super::*;
    use crate::rate_limit::RecordingPacer;

    /// Elevation as a plane z = base + ax * east_m + ay * north_m around an origin,
    /// optionally failing for some grid offsets
    struct PlaneService {
        origin: (f64, f64),
        base: f64,
        ax: f64,
        ay: f64,
        fail: Vec<(i8, i8)>,
        grid_size_m: f64,
        calls: RefCell<Vec<(f64, f64)>>,
    }

    impl PlaneService {
        fn new(origin: (f64, f64), base: f64, ax: f64, ay: f64) -> Self {
            Self { origin, base, ax, ay, fail: Vec::new(), grid_size_m: 100.0, calls: RefCell::new(Vec::new()) }
        }

        fn offset(&self, lat: f64, lon: f64) -> (i8, i8) {
            let lat_delta = self.grid_size_m / METERS_PER_DEGREE;
            let lon_delta = self.grid_size_m / (METERS_PER_DEGREE * self.origin.0.to_radians().cos());
            (((lat - self.origin.0) / lat_delta).round() as i8, ((lon - self.origin.1) / lon_delta).round() as i8)
        }
    }

    impl ElevationService for &PlaneService {
        fn get_elevation(&self, lat: f64, lon: f64) -> Option<f64> {
            self.calls.borrow_mut().push((lat, lon));
            let (i, j) = self.offset(lat, lon);
            if self.fail.contains(&(i, j)) {
                return None;
            }
            Some(self.base + self.ax * j as f64 * self.grid_size_m + self.ay * i as f64 * self.grid_size_m)
        }
    }

    #[test]
    fn grid_is_three_by_three_around_center() {
        let grid = sampling_grid(60.0, 10.0, 111.0);

        assert_eq!(grid.len(), 9);
        let center = grid.iter().find(|p| p.i == 0 && p.j == 0).unwrap();
        assert_eq!((center.lat, center.lon), (60.0, 10.0));
        let north = grid.iter().find(|p| p.i == 1 && p.j == 0).unwrap();
        assert!((north.lat - 60.001).abs() < 1e-12);
        let east = grid.iter().find(|p| p.i == 0 && p.j == 1).unwrap();
        assert!((east.lon - 10.002).abs() < 1e-9);
    }

    #[test]
    fn aspect_follows_gradient_direction() {
        let service = PlaneService::new((46.0, 7.0), 1000.0, 0.1, 0.0);
        let mut estimator = TerrainEstimator::new(&service, RecordingPacer::default(), Duration::from_millis(100));

        let profile = estimator.get_terrain_data(46.0, 7.0, 100.0);

        assert!((profile.slope_deg - 0.1f64.atan().to_degrees()).abs() < 1e-9);
        assert!((profile.aspect_deg - 90.0).abs() < 1e-9);
        assert_eq!(profile.elevation, 1000.0);
    }

    #[test]
    fn aspect_is_normalized_into_compass_range() {
        let service = PlaneService::new((46.0, 7.0), 500.0, -0.05, -0.05);
        let mut estimator = TerrainEstimator::new(&service, RecordingPacer::default(), Duration::ZERO);

        let profile = estimator.get_terrain_data(46.0, 7.0, 100.0);

        assert!((profile.aspect_deg - 225.0).abs() < 1e-9);
        assert!(profile.slope_deg > 0.0);
    }

    #[test]
    fn queries_are_sequential_and_paced() {
        let service = PlaneService::new((46.0, 7.0), 1000.0, 0.0, 0.0);
        let mut pacer = RecordingPacer::default();
        let mut estimator = TerrainEstimator::new(&service, &mut pacer, Duration::from_millis(100));

        let profile = estimator.get_terrain_data(46.0, 7.0, 100.0);

        assert_eq!(profile.slope_deg, 0.0);
        assert_eq!(service.calls.borrow().len(), 9);
        assert_eq!(pacer.pauses, vec![Duration::from_millis(100); 8]);
    }

    /// Writes 'Q' for every elevation query and 'P' for every pause into one event log
    struct EventLog(RefCell<String>);

    impl ElevationService for &EventLog {
        fn get_elevation(&self, _lat: f64, _lon: f64) -> Option<f64> {
            self.0.borrow_mut().push('Q');
            Some(1000.0)
        }
    }

    impl Pacer for &EventLog {
        fn pause(&mut self, _delay: Duration) {
            self.0.borrow_mut().push('P');
        }
    }

    #[test]
    fn consecutive_lookups_stay_paced() {
        let log = EventLog(RefCell::new(String::new()));
        let mut estimator = TerrainEstimator::new(&log, &log, Duration::from_millis(100));
        let mut cache = TerrainCache::new(4);

        estimator.get_terrain_data_cached(&mut cache, 46.0, 7.0, 100.0);
        estimator.get_terrain_data_cached(&mut cache, 47.0, 8.0, 100.0);

        let events = log.0.borrow();
        assert_eq!(events.matches('Q').count(), 18);
        assert_eq!(events.matches('P').count(), 17);
        assert!(!events.contains("QQ"));
        assert!(events.starts_with('Q'));
    }

    #[test]
    fn missing_neighbors_fall_back_to_center() {
        let mut service = PlaneService::new((46.0, 7.0), 1000.0, 0.1, 0.0);
        service.fail = vec![(0, 1), (0, -1)];
        let mut estimator = TerrainEstimator::new(&service, RecordingPacer::default(), Duration::ZERO);

        let profile = estimator.get_terrain_data(46.0, 7.0, 100.0);

        assert_eq!(profile.slope_deg, 0.0);
        assert_eq!(profile.elevation, 1000.0);
    }

    #[test]
    fn all_failures_give_flat_sea_level() {
        let mut service = PlaneService::new((46.0, 7.0), 1000.0, 0.1, 0.1);
        service.fail = sampling_grid(46.0, 7.0, 100.0).iter().map(|p| (p.i, p.j)).collect();
        let mut estimator = TerrainEstimator::new(&service, RecordingPacer::default(), Duration::ZERO);

        let profile = estimator.get_terrain_data(46.0, 7.0, 100.0);

        assert_eq!(profile, TerrainProfile { slope_deg: 0.0, aspect_deg: 0.0, elevation: 0.0 });
    }

    #[test]
    fn nearby_coordinates_hit_the_cache() {
        let service = PlaneService::new((46.0, 7.0), 1000.0, 0.1, 0.0);
        let mut estimator = TerrainEstimator::new(&service, RecordingPacer::default(), Duration::ZERO);
        let mut cache = TerrainCache::new(16);

        let first = estimator.get_terrain_data_cached(&mut cache, 46.00001, 7.00002, 100.0);
        let second = estimator.get_terrain_data_cached(&mut cache, 46.00004, 7.00003, 100.0);

        assert_eq!(first, second);
        assert_eq!(service.calls.borrow().len(), 9);
        assert_eq!(cache.len(), 1);

        estimator.get_terrain_data_cached(&mut cache, 46.00004, 7.00003, 50.0);
        assert_eq!(service.calls.borrow().len(), 18);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let profile = |e: f64| TerrainProfile { slope_deg: 0.0, aspect_deg: 0.0, elevation: e };
        let mut cache = TerrainCache::new(2);
        let a = CacheKey::new(1.0, 1.0, 100.0);
        let b = CacheKey::new(2.0, 2.0, 100.0);
        let c = CacheKey::new(3.0, 3.0, 100.0);

        cache.insert(a.clone(), profile(1.0));
        cache.insert(b.clone(), profile(2.0));
        assert_eq!(cache.get(&a), Some(profile(1.0)));
        cache.insert(c.clone(), profile(3.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&b).is_none());
        assert_eq!(cache.get(&a), Some(profile(1.0)));
        assert_eq!(cache.get(&c), Some(profile(3.0)));
    }

    #[test]
    fn cache_key_rounds_to_four_decimals() {
        assert_eq!(CacheKey::new(46.12341, 7.00001, 100.0), CacheKey::new(46.12344, 7.00004, 100.0));
        assert_ne!(CacheKey::new(46.1234, 7.0, 100.0), CacheKey::new(46.1235, 7.0, 100.0));
        assert_ne!(CacheKey::new(46.1234, 7.0, 100.0), CacheKey::new(46.1234, 7.0, 200.0));
    }
}
