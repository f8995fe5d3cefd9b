//! Seams between the planning engine and its collaborators.
//!
//! The HTTP adapter in [`crate::google_maps`] and the local estimator in
//! [`crate::haversine`] implement the provider traits; tests supply their
//! own stubs.

use chrono::{DateTime, Utc};

use crate::error::{ProviderError, StoreError};
use crate::model::{Coordinates, TravelEstimate, Waypoint};
use crate::tracker::ActiveRouteRecord;

/// Provider hard limit on destinations per distance-matrix request.
pub const MAX_MATRIX_DESTINATIONS: usize = 25;

/// Provider hard limit on intermediate waypoints per directions request.
pub const MAX_WAYPOINTS: usize = 23;

/// Answers one origin-to-many-destinations distance query.
pub trait DistanceMatrixProvider {
    /// Returns one entry per destination, positionally. `None` means the
    /// provider had no answer for that destination.
    ///
    /// Callers never pass more than [`MAX_MATRIX_DESTINATIONS`] destinations.
    fn distance_row(
        &self,
        origin: &Waypoint,
        destinations: &[Coordinates],
    ) -> Result<Vec<Option<TravelEstimate>>, ProviderError>;
}

/// A directions request whose intermediate waypoints may be reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointRequest {
    pub origin: Waypoint,
    pub destination: Waypoint,
    pub waypoints: Vec<Coordinates>,
}

/// Provider answer to a [`WaypointRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedWaypoints {
    /// Permutation of `0..waypoints.len()` giving the visiting order.
    pub waypoint_order: Vec<usize>,
    /// One leg per waypoint plus the final leg to the destination.
    pub legs: Vec<TravelEstimate>,
}

/// Reorders intermediate waypoints into an efficient driving sequence.
pub trait WaypointOptimizer {
    fn optimize_waypoints(
        &self,
        request: &WaypointRequest,
    ) -> Result<OptimizedWaypoints, ProviderError>;
}

impl<T: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for &T {
    fn distance_row(
        &self,
        origin: &Waypoint,
        destinations: &[Coordinates],
    ) -> Result<Vec<Option<TravelEstimate>>, ProviderError> {
        (**self).distance_row(origin, destinations)
    }
}

impl<T: WaypointOptimizer + ?Sized> WaypointOptimizer for &T {
    fn optimize_waypoints(
        &self,
        request: &WaypointRequest,
    ) -> Result<OptimizedWaypoints, ProviderError> {
        (**self).optimize_waypoints(request)
    }
}

/// Durable client-local storage for the single active route.
pub trait RouteStore {
    fn load(&self) -> Result<Option<ActiveRouteRecord>, StoreError>;

    /// Overwrites whatever was stored before.
    fn save(&mut self, record: &ActiveRouteRecord) -> Result<(), StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Source of wall-clock time for timestamps and the elapsed timer.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
