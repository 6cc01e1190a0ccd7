pub mod gazetteer;
pub mod nominatim;
pub mod resolver;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Smallest non-zero distance `distance_km` reports.
const DISTANCE_STEP_KM: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lon = (delta_lon / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lon * sin_lon;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Great-circle distance in kilometres, rounded to two decimal places.
///
/// Only identical points are 0.0 apart. Distinct points closer than half a
/// step report one step (0.01 km) instead of rounding down to zero.
pub fn distance_km(a: &Coordinates, b: &Coordinates) -> f64 {
    if a == b {
        return 0.0;
    }
    let rounded = (haversine_km(a, b) / DISTANCE_STEP_KM).round() * DISTANCE_STEP_KM;
    rounded.max(DISTANCE_STEP_KM)
}
