//! Great-circle distance between WGS84 coordinates.

use serde::{Deserialize, Serialize};

use super::domain::InvalidArgument;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting values outside the WGS84 ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidArgument> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(InvalidArgument::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(InvalidArgument::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }
}

/// Haversine distance in meters. Symmetric, and zero for identical points.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}
