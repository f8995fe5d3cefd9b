//! Google Maps HTTP adapter for distance matrices and waypoint optimization.

use std::env;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, ProviderError};
use crate::model::{Coordinates, TravelEstimate, Waypoint};
use crate::traits::{
    DistanceMatrixProvider, OptimizedWaypoints, WaypointOptimizer, WaypointRequest,
};

pub const API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";
pub const BASE_URL_VAR: &str = "GOOGLE_MAPS_BASE_URL";

const STATUS_OK: &str = "OK";

#[derive(Debug, Clone)]
pub struct GoogleMapsConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// Ask for traffic-aware durations by departing "now".
    pub departure_time_now: bool,
}

impl Default for GoogleMapsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
            departure_time_now: true,
        }
    }
}

impl GoogleMapsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Reads the API key (required) and base URL (optional) from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var(API_KEY_VAR).map_err(|_| ConfigError::MissingVar(API_KEY_VAR))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = env::var(BASE_URL_VAR) {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Clone)]
pub struct GoogleMapsClient {
    config: GoogleMapsConfig,
    client: reqwest::blocking::Client,
}

impl GoogleMapsClient {
    pub fn new(config: GoogleMapsConfig) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ConfigError::ClientBuild)?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, service: &str) -> String {
        format!(
            "{}/{}/json",
            self.config.base_url.trim_end_matches('/'),
            service
        )
    }

    fn distance_matrix_url(
        &self,
        origin: &Waypoint,
        destinations: &[Coordinates],
    ) -> Result<Url, ProviderError> {
        let destinations = destinations
            .iter()
            .map(Coordinates::to_param)
            .collect::<Vec<_>>()
            .join("|");

        let mut params = vec![
            ("origins", origin.to_param()),
            ("destinations", destinations),
            ("mode", "driving".to_string()),
            ("units", "imperial".to_string()),
        ];
        if self.config.departure_time_now {
            params.push(("departure_time", "now".to_string()));
        }
        params.push(("key", self.config.api_key.clone()));

        Url::parse_with_params(&self.endpoint("distancematrix"), &params)
            .map_err(|err| ProviderError::Malformed(format!("invalid provider URL: {err}")))
    }

    fn directions_url(&self, request: &WaypointRequest) -> Result<Url, ProviderError> {
        let mut params = vec![
            ("origin", request.origin.to_param()),
            ("destination", request.destination.to_param()),
        ];
        if !request.waypoints.is_empty() {
            let waypoints = std::iter::once("optimize:true".to_string())
                .chain(request.waypoints.iter().map(Coordinates::to_param))
                .collect::<Vec<_>>()
                .join("|");
            params.push(("waypoints", waypoints));
        }
        params.push(("mode", "driving".to_string()));
        params.push(("key", self.config.api_key.clone()));

        Url::parse_with_params(&self.endpoint("directions"), &params)
            .map_err(|err| ProviderError::Malformed(format!("invalid provider URL: {err}")))
    }

    fn get_json<T>(&self, url: Url) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        debug!(path = url.path(), "calling routing provider");
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<T>())?;
        Ok(body)
    }
}

impl DistanceMatrixProvider for GoogleMapsClient {
    fn distance_row(
        &self,
        origin: &Waypoint,
        destinations: &[Coordinates],
    ) -> Result<Vec<Option<TravelEstimate>>, ProviderError> {
        if destinations.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.distance_matrix_url(origin, destinations)?;
        let body: DistanceMatrixResponse = self.get_json(url)?;
        body.into_row()
    }
}

impl WaypointOptimizer for GoogleMapsClient {
    fn optimize_waypoints(
        &self,
        request: &WaypointRequest,
    ) -> Result<OptimizedWaypoints, ProviderError> {
        let url = self.directions_url(request)?;
        let body: DirectionsResponse = self.get_json(url)?;
        body.into_optimized(request.waypoints.len())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ValueField {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<DistanceMatrixRow>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixRow {
    #[serde(default)]
    elements: Vec<DistanceMatrixElement>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixElement {
    status: String,
    distance: Option<ValueField>,
    duration: Option<ValueField>,
    duration_in_traffic: Option<ValueField>,
}

impl DistanceMatrixElement {
    /// Prefers the traffic-aware duration when the provider supplied one.
    fn to_estimate(&self) -> Option<TravelEstimate> {
        if self.status != STATUS_OK {
            return None;
        }
        let distance = self.distance?;
        let duration = self.duration_in_traffic.or(self.duration)?;
        Some(TravelEstimate {
            distance_meters: distance.value,
            duration_seconds: duration.value,
        })
    }
}

impl DistanceMatrixResponse {
    fn into_row(self) -> Result<Vec<Option<TravelEstimate>>, ProviderError> {
        if self.status != STATUS_OK {
            return Err(ProviderError::Status {
                status: self.status,
                message: self.error_message.unwrap_or_default(),
            });
        }

        let row = self
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("distance matrix has no rows".to_string()))?;

        Ok(row
            .elements
            .iter()
            .map(DistanceMatrixElement::to_estimate)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    #[serde(default)]
    waypoint_order: Vec<usize>,
    #[serde(default)]
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    distance: ValueField,
    duration: ValueField,
}

impl DirectionsResponse {
    fn into_optimized(self, waypoint_count: usize) -> Result<OptimizedWaypoints, ProviderError> {
        if self.status != STATUS_OK {
            return Err(ProviderError::Status {
                status: self.status,
                message: self.error_message.unwrap_or_default(),
            });
        }

        let route = self
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("directions returned no routes".to_string()))?;

        // The provider omits `waypoint_order` entirely when there were no waypoints.
        let waypoint_order = if route.waypoint_order.is_empty() {
            (0..waypoint_count).collect()
        } else {
            route.waypoint_order
        };

        Ok(OptimizedWaypoints {
            waypoint_order,
            legs: route
                .legs
                .into_iter()
                .map(|leg| TravelEstimate {
                    distance_meters: leg.distance.value,
                    duration_seconds: leg.duration.value,
                })
                .collect(),
        })
    }
}
