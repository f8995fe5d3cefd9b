//! Domain types shared by the optimizer and the active route tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority assigned to stops whose source record carries no score.
pub const DEFAULT_PRIORITY: f64 = 50.0;

const METERS_PER_MILE: f64 = 1609.344;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Formats as `lat,lng` for provider query strings.
    pub fn to_param(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lng)
    }
}

/// A location as handed to the routing provider.
///
/// The start of a route is often typed in by the field worker, so it may be
/// a free-text address rather than a geocoded point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Waypoint {
    Address(String),
    Coordinates(Coordinates),
}

impl Waypoint {
    pub fn to_param(&self) -> String {
        match self {
            Self::Address(address) => address.trim().to_string(),
            Self::Coordinates(coords) => coords.to_param(),
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Address(_) => None,
            Self::Coordinates(coords) => Some(*coords),
        }
    }
}

impl From<Coordinates> for Waypoint {
    fn from(coords: Coordinates) -> Self {
        Self::Coordinates(coords)
    }
}

/// A visitable permit or lead location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    pub coordinates: Coordinates,
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default = "default_priority")]
    pub priority_score: f64,
}

fn default_priority() -> f64 {
    DEFAULT_PRIORITY
}

impl Stop {
    pub fn new(id: impl Into<String>, coordinates: Coordinates, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinates,
            address: address.into(),
            city: String::new(),
            priority_score: DEFAULT_PRIORITY,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_priority(mut self, priority_score: f64) -> Self {
        self.priority_score = priority_score;
        self
    }

    /// Key used to detect the same house pulled in from two records.
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.address.trim().to_lowercase(),
            self.city.trim().to_lowercase(),
        )
    }
}

/// Real driving distance and duration from one point to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelEstimate {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

impl TravelEstimate {
    pub fn to_leg(self) -> Leg {
        Leg {
            distance_miles: meters_to_miles(self.distance_meters),
            duration_minutes: self.duration_seconds / 60.0,
            estimated: false,
        }
    }
}

/// A stop ranked during optimization. Never outlives a single `optimize` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredStop {
    pub stop: Stop,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub composite_score: f64,
    /// Position in the caller's stop list, used to restore input order.
    pub input_index: usize,
}

/// Travel segment arriving at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub distance_miles: f64,
    pub duration_minutes: f64,
    /// True when the leg comes from a local heuristic instead of the provider.
    pub estimated: bool,
}

impl Leg {
    pub const fn estimate(distance_miles: f64, duration_minutes: f64) -> Self {
        Self {
            distance_miles,
            duration_minutes,
            estimated: true,
        }
    }
}

/// Where the ordering of an [`OptimizedRoute`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanSource {
    /// Ordered by the provider's waypoint optimization.
    Provider,
    /// Provider failed; input order with rough estimates.
    Fallback,
    /// Local nearest-neighbor construction.
    Local,
}

/// Optimizer output. `legs[i]` is the leg arriving at `stops[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedRoute {
    pub stops: Vec<Stop>,
    pub legs: Vec<Leg>,
    pub return_leg: Option<Leg>,
    pub total_distance_miles: f64,
    pub total_duration_minutes: f64,
    pub source: PlanSource,
}

impl OptimizedRoute {
    pub fn empty(source: PlanSource) -> Self {
        Self {
            stops: Vec::new(),
            legs: Vec::new(),
            return_leg: None,
            total_distance_miles: 0.0,
            total_duration_minutes: 0.0,
            source,
        }
    }

    /// Builds a route and derives the totals from its legs.
    pub fn from_legs(
        stops: Vec<Stop>,
        legs: Vec<Leg>,
        return_leg: Option<Leg>,
        source: PlanSource,
    ) -> Self {
        let all_legs = legs.iter().chain(return_leg.iter());
        let (total_distance_miles, total_duration_minutes) = all_legs
            .fold((0.0, 0.0), |(miles, minutes), leg| {
                (miles + leg.distance_miles, minutes + leg.duration_minutes)
            });

        Self {
            stops,
            legs,
            return_leg,
            total_distance_miles,
            total_duration_minutes,
            source,
        }
    }
}

/// A stop placed in a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    #[serde(flatten)]
    pub stop: Stop,
    /// 1-based position in the route.
    pub order: usize,
    pub visited: bool,
    pub distance_from_previous: f64,
    pub estimated_minutes_from_previous: f64,
}

/// An ordered route owned by the active route tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub stops: Vec<RouteStop>,
    pub start_address: String,
    pub end_address: String,
    pub total_distance: f64,
    pub total_duration: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_stop_index: usize,
}

impl Route {
    pub fn from_optimized(
        optimized: &OptimizedRoute,
        start_address: impl Into<String>,
        end_address: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let stops = optimized
            .stops
            .iter()
            .zip(optimized.legs.iter())
            .enumerate()
            .map(|(i, (stop, leg))| RouteStop {
                stop: stop.clone(),
                order: i + 1,
                visited: false,
                distance_from_previous: leg.distance_miles.max(0.0),
                estimated_minutes_from_previous: leg.duration_minutes.max(0.0),
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            stops,
            start_address: start_address.into(),
            end_address: end_address.into(),
            total_distance: optimized.total_distance_miles,
            total_duration: optimized.total_duration_minutes,
            started_at,
            completed_at: None,
            current_stop_index: 0,
        }
    }

    pub fn all_visited(&self) -> bool {
        !self.stops.is_empty() && self.stops.iter().all(|stop| stop.visited)
    }

    pub fn visited_count(&self) -> usize {
        self.stops.iter().filter(|stop| stop.visited).count()
    }

    pub fn last_index(&self) -> usize {
        self.stops.len().saturating_sub(1)
    }
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}
