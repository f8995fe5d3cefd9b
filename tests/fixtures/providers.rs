//! Deterministic stand-ins for the routing provider.

use std::cell::{Cell, RefCell};

use field_route_planner::error::ProviderError;
use field_route_planner::model::{Coordinates, TravelEstimate, Waypoint};
use field_route_planner::traits::{
    DistanceMatrixProvider, OptimizedWaypoints, WaypointOptimizer, WaypointRequest,
};

fn over_query_limit() -> ProviderError {
    ProviderError::Status {
        status: "OVER_QUERY_LIMIT".to_string(),
        message: "daily quota exceeded".to_string(),
    }
}

/// Same distance and duration for every destination.
pub struct ConstantMatrix {
    pub estimate: TravelEstimate,
    pub fail: bool,
    pub calls: Cell<usize>,
}

impl ConstantMatrix {
    pub fn new(distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            estimate: TravelEstimate {
                distance_meters,
                duration_seconds,
            },
            fail: false,
            calls: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0.0, 0.0)
        }
    }
}

impl DistanceMatrixProvider for ConstantMatrix {
    fn distance_row(
        &self,
        _origin: &Waypoint,
        destinations: &[Coordinates],
    ) -> Result<Vec<Option<TravelEstimate>>, ProviderError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(over_query_limit());
        }
        Ok(vec![Some(self.estimate); destinations.len()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMode {
    /// Keep the submitted waypoint order.
    Identity,
    /// Visit waypoints back to front.
    Reverse,
    /// Answer with a broken permutation.
    Garbage,
    /// Fail the request.
    Fail,
}

/// Waypoint optimizer that records every request.
///
/// Each returned leg is `leg_meters` / `leg_seconds`.
pub struct ScriptedOptimizer {
    pub mode: OrderMode,
    pub leg_meters: f64,
    pub leg_seconds: f64,
    pub requests: RefCell<Vec<WaypointRequest>>,
}

impl ScriptedOptimizer {
    pub fn new(mode: OrderMode) -> Self {
        Self {
            mode,
            leg_meters: 1609.344,
            leg_seconds: 300.0,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_request(&self) -> Option<WaypointRequest> {
        self.requests.borrow().last().cloned()
    }
}

impl WaypointOptimizer for ScriptedOptimizer {
    fn optimize_waypoints(
        &self,
        request: &WaypointRequest,
    ) -> Result<OptimizedWaypoints, ProviderError> {
        self.requests.borrow_mut().push(request.clone());
        let count = request.waypoints.len();

        let waypoint_order = match self.mode {
            OrderMode::Identity => (0..count).collect(),
            OrderMode::Reverse => (0..count).rev().collect(),
            OrderMode::Garbage => vec![0; count.max(2)],
            OrderMode::Fail => return Err(over_query_limit()),
        };
        let legs = vec![
            TravelEstimate {
                distance_meters: self.leg_meters,
                duration_seconds: self.leg_seconds,
            };
            count + 1
        ];

        Ok(OptimizedWaypoints {
            waypoint_order,
            legs,
        })
    }
}
