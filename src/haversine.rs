//! Great-circle distance estimation (fallback when the provider is unavailable).
//!
//! Ignores roads, so it underestimates real driving distance, but it is
//! always available and costs nothing.

use rayon::prelude::*;

use crate::error::ProviderError;
use crate::model::{miles_to_meters, Coordinates, TravelEstimate, Waypoint};
use crate::traits::DistanceMatrixProvider;

/// Earth radius in miles.
const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Average residential driving speed assumption for time estimation.
const DEFAULT_SPEED_MPH: f64 = 25.0;

/// Great-circle distance between two points in miles.
pub fn distance_miles(from: Coordinates, to: Coordinates) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_MILES * c
}

/// Haversine-based distance matrix provider.
///
/// Estimates travel time using straight-line distance and an assumed speed.
/// Only usable with a geocoded origin; a free-text origin is reported as a
/// provider error so callers take their normal fallback path.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in miles per hour.
    pub speed_mph: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_mph: DEFAULT_SPEED_MPH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_mph: f64) -> Self {
        Self { speed_mph }
    }

    fn miles_to_seconds(&self, miles: f64) -> f64 {
        (miles / self.speed_mph * 3600.0).round()
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn distance_row(
        &self,
        origin: &Waypoint,
        destinations: &[Coordinates],
    ) -> Result<Vec<Option<TravelEstimate>>, ProviderError> {
        let from = origin.coordinates().ok_or_else(|| {
            ProviderError::Malformed("local estimator needs a geocoded origin".to_string())
        })?;

        Ok(destinations
            .par_iter()
            .map(|to| {
                let miles = distance_miles(from, *to);
                Some(TravelEstimate {
                    distance_meters: miles_to_meters(miles),
                    duration_seconds: self.miles_to_seconds(miles),
                })
            })
            .collect())
    }
}
