//! Single-driver route optimization.
//!
//! Pipeline: dedupe by address, rank by priority and proximity, then hand
//! the best candidates to the provider's waypoint optimizer. Provider
//! failures never escape `optimize`; they produce a rough fallback route.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn, Level};

use crate::distance_matrix::{batch_distances, BatchOptions};
use crate::error::ProviderError;
use crate::haversine::distance_miles;
use crate::model::{Leg, OptimizedRoute, PlanSource, ScoredStop, Stop, TravelEstimate, Waypoint};
use crate::traits::{
    DistanceMatrixProvider, MAX_MATRIX_DESTINATIONS, MAX_WAYPOINTS, WaypointOptimizer,
    WaypointRequest,
};

#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Weight of the lead's business priority in the composite score.
    pub priority_weight: f64,
    /// Weight of proximity (`proximity_scale / (duration + 1)`).
    pub proximity_weight: f64,
    pub proximity_scale: f64,
    /// Local estimate: driving minutes per straight-line mile.
    pub minutes_per_mile: f64,
    /// Local estimate: time spent at each door.
    pub service_minutes_per_stop: f64,
    /// Provider-failure estimate per stop.
    pub fallback_miles_per_stop: f64,
    pub fallback_minutes_per_stop: f64,
    /// Candidates kept after ranking.
    pub max_candidates: usize,
    /// Waypoints per directions request.
    pub max_waypoints: usize,
    pub batch: BatchOptions,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            priority_weight: 0.4,
            proximity_weight: 0.6,
            proximity_scale: 1000.0,
            minutes_per_mile: 2.0,
            service_minutes_per_stop: 15.0,
            fallback_miles_per_stop: 5.0,
            fallback_minutes_per_stop: 20.0,
            max_candidates: MAX_MATRIX_DESTINATIONS,
            max_waypoints: MAX_WAYPOINTS,
            batch: BatchOptions::default(),
        }
    }
}

impl OptimizeOptions {
    /// Local leg estimate for a straight-line distance.
    pub fn estimate_leg(&self, miles: f64) -> Leg {
        Leg::estimate(
            miles,
            miles * self.minutes_per_mile + self.service_minutes_per_stop,
        )
    }

    /// Driving time only, comparable with provider legs.
    pub fn drive_leg(&self, miles: f64) -> Leg {
        Leg::estimate(miles, miles * self.minutes_per_mile)
    }

    fn fallback_leg(&self) -> Leg {
        Leg::estimate(self.fallback_miles_per_stop, self.fallback_minutes_per_stop)
    }

    /// `priority_weight * priority + proximity_weight * scale / (duration + 1)`.
    ///
    /// An unknown duration contributes no proximity at all.
    pub fn composite_score(&self, priority_score: f64, duration_seconds: Option<f64>) -> f64 {
        let proximity = duration_seconds
            .map(|seconds| self.proximity_scale / (seconds.max(0.0) + 1.0))
            .unwrap_or(0.0);
        self.priority_weight * priority_score + self.proximity_weight * proximity
    }
}

/// Drops stops whose normalized address and city match an earlier stop.
pub fn dedupe_stops(stops: &[Stop]) -> Vec<Stop> {
    dedupe_indexed(stops)
        .into_iter()
        .map(|(_, stop)| stop.clone())
        .collect()
}

fn dedupe_indexed(stops: &[Stop]) -> Vec<(usize, &Stop)> {
    let mut seen = HashSet::new();
    stops
        .iter()
        .enumerate()
        .filter(|(_, stop)| seen.insert(stop.dedup_key()))
        .collect()
}

/// Greedy nearest-neighbor visiting order, anchored at `stops[0]`.
///
/// Returns indices into `stops`; each index appears exactly once.
pub fn nearest_neighbor_order(stops: &[Stop]) -> Vec<usize> {
    if stops.is_empty() {
        return Vec::new();
    }

    let mut order = Vec::with_capacity(stops.len());
    let mut placed = vec![false; stops.len()];
    let mut current = 0;
    placed[current] = true;
    order.push(current);

    for _ in 1..stops.len() {
        let here = stops[current].coordinates;
        let next = stops
            .iter()
            .enumerate()
            .filter(|(i, _)| !placed[*i])
            .map(|(i, stop)| (i, distance_miles(here, stop.coordinates)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        let Some(next) = next else { break };
        placed[next] = true;
        order.push(next);
        current = next;
    }

    order
}

/// Provider-free ordering: dedupe, then nearest-neighbor from the first stop,
/// with legs estimated from straight-line distance.
pub fn plan_local(stops: &[Stop], options: &OptimizeOptions) -> OptimizedRoute {
    let unique = dedupe_stops(stops);
    if unique.is_empty() {
        return OptimizedRoute::empty(PlanSource::Local);
    }

    let order = nearest_neighbor_order(&unique);
    let mut ordered = Vec::with_capacity(order.len());
    let mut legs = Vec::with_capacity(order.len());
    let mut previous = None;
    for index in order {
        let stop = &unique[index];
        let miles = previous.map_or(0.0, |from| distance_miles(from, stop.coordinates));
        legs.push(options.estimate_leg(miles));
        previous = Some(stop.coordinates);
        ordered.push(stop.clone());
    }

    OptimizedRoute::from_legs(ordered, legs, None, PlanSource::Local)
}

/// Ranks stops by composite score, best first. Ties keep input order.
pub fn score_stops(
    stops: &[(usize, Stop)],
    distances: &HashMap<String, TravelEstimate>,
    options: &OptimizeOptions,
) -> Vec<ScoredStop> {
    let mut scored: Vec<ScoredStop> = stops
        .iter()
        .map(|(input_index, stop)| {
            let estimate = distances.get(&stop.id);
            let duration_seconds = estimate.map(|e| e.duration_seconds);
            ScoredStop {
                stop: stop.clone(),
                distance_meters: estimate.map(|e| e.distance_meters),
                duration_seconds,
                composite_score: options.composite_score(stop.priority_score, duration_seconds),
                input_index: *input_index,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
    scored
}

pub struct RouteOptimizer<M, W> {
    matrix: M,
    directions: W,
    options: OptimizeOptions,
}

impl<M, W> RouteOptimizer<M, W>
where
    M: DistanceMatrixProvider,
    W: WaypointOptimizer,
{
    pub fn new(matrix: M, directions: W) -> Self {
        Self::with_options(matrix, directions, OptimizeOptions::default())
    }

    pub fn with_options(matrix: M, directions: W, options: OptimizeOptions) -> Self {
        Self {
            matrix,
            directions,
            options,
        }
    }

    pub fn options(&self) -> &OptimizeOptions {
        &self.options
    }

    pub fn plan_local(&self, stops: &[Stop]) -> OptimizedRoute {
        plan_local(stops, &self.options)
    }

    /// Orders `stops` into a single-driver route starting at `origin`.
    ///
    /// Never fails: provider problems yield [`PlanSource::Fallback`].
    pub fn optimize(&self, origin: &Waypoint, stops: &[Stop], return_to_origin: bool) -> OptimizedRoute {
        let unique: Vec<(usize, Stop)> = dedupe_indexed(stops)
            .into_iter()
            .map(|(i, stop)| (i, stop.clone()))
            .collect();

        if unique.len() < stops.len() {
            debug!(dropped = stops.len() - unique.len(), "duplicate addresses removed");
        }
        if unique.is_empty() {
            return OptimizedRoute::empty(PlanSource::Local);
        }

        // Ranking two stops changes nothing the provider won't redo.
        let candidates: Vec<ScoredStop> = if unique.len() <= 2 {
            unique
                .iter()
                .map(|(input_index, stop)| ScoredStop {
                    stop: stop.clone(),
                    distance_meters: None,
                    duration_seconds: None,
                    composite_score: self.options.composite_score(stop.priority_score, None),
                    input_index: *input_index,
                })
                .collect()
        } else {
            self.rank_candidates(origin, &unique)
        };

        if candidates.len() == 1 {
            return self.single_stop(origin, &candidates[0].stop);
        }

        match self.provider_order(origin, &candidates, return_to_origin) {
            Ok(route) => {
                info!(
                    stops = route.stops.len(),
                    miles = route.total_distance_miles,
                    minutes = route.total_duration_minutes,
                    "route optimized by provider"
                );
                route
            }
            Err(err) => {
                warn!(error = %err, "waypoint optimization failed, using input order");
                self.fallback(candidates)
            }
        }
    }

    fn rank_candidates(&self, origin: &Waypoint, unique: &[(usize, Stop)]) -> Vec<ScoredStop> {
        let unique_stops: Vec<Stop> = unique.iter().map(|(_, stop)| stop.clone()).collect();

        if tracing::enabled!(Level::DEBUG) {
            let baseline = plan_local(&unique_stops, &self.options);
            debug!(
                miles = baseline.total_distance_miles,
                minutes = baseline.total_duration_minutes,
                "nearest-neighbor baseline"
            );
        }

        let distances = batch_distances(&self.matrix, origin, &unique_stops, &self.options.batch);
        let mut scored = score_stops(unique, &distances, &self.options);
        if scored.len() > self.options.max_candidates {
            debug!(
                kept = self.options.max_candidates,
                dropped = scored.len() - self.options.max_candidates,
                "truncating to top candidates"
            );
            scored.truncate(self.options.max_candidates);
        }
        scored
    }

    fn single_stop(&self, origin: &Waypoint, stop: &Stop) -> OptimizedRoute {
        let distances = batch_distances(
            &self.matrix,
            origin,
            std::slice::from_ref(stop),
            &self.options.batch,
        );
        match distances.get(&stop.id) {
            Some(estimate) => OptimizedRoute::from_legs(
                vec![stop.clone()],
                vec![estimate.to_leg()],
                None,
                PlanSource::Provider,
            ),
            None => OptimizedRoute::from_legs(
                vec![stop.clone()],
                vec![self.options.fallback_leg()],
                None,
                PlanSource::Fallback,
            ),
        }
    }

    /// Destination removal happens before the waypoint cap is applied.
    ///
    /// Stops beyond the cap follow the optimized ones with straight-line
    /// driving legs. They are visited after the provider's last waypoint, so
    /// the provider's return leg is replaced by an estimate from the last
    /// overflow stop, or dropped when the origin has no coordinates.
    fn provider_order(
        &self,
        origin: &Waypoint,
        candidates: &[ScoredStop],
        return_to_origin: bool,
    ) -> Result<OptimizedRoute, ProviderError> {
        let mut pending: Vec<&Stop> = candidates.iter().map(|c| &c.stop).collect();
        let destination_stop = if return_to_origin { None } else { pending.pop() };
        let cap = self.options.max_waypoints.min(MAX_WAYPOINTS);
        let overflow = if pending.len() > cap {
            pending.split_off(cap)
        } else {
            Vec::new()
        };

        let request = WaypointRequest {
            origin: origin.clone(),
            destination: destination_stop
                .map_or_else(|| origin.clone(), |stop| stop.coordinates.into()),
            waypoints: pending.iter().map(|stop| stop.coordinates).collect(),
        };
        let response = self.directions.optimize_waypoints(&request)?;
        validate_response(pending.len(), &response.waypoint_order, response.legs.len())?;

        let mut ordered: Vec<Stop> = response
            .waypoint_order
            .iter()
            .map(|&i| pending[i].clone())
            .collect();
        let mut legs: Vec<Leg> = response
            .legs
            .iter()
            .take(pending.len())
            .map(|leg| leg.to_leg())
            .collect();

        let final_leg = response.legs.get(pending.len()).map(|leg| leg.to_leg());
        let mut return_leg = match destination_stop {
            Some(stop) => {
                ordered.push(stop.clone());
                legs.extend(final_leg);
                None
            }
            None => final_leg,
        };

        if !overflow.is_empty() {
            debug!(count = overflow.len(), "appending stops beyond the waypoint cap");
        }
        for stop in &overflow {
            let miles = ordered
                .last()
                .map_or(0.0, |prev| distance_miles(prev.coordinates, stop.coordinates));
            legs.push(self.options.drive_leg(miles));
            ordered.push((*stop).clone());
        }
        if return_leg.is_some() {
            if let Some(last) = overflow.last() {
                return_leg = origin
                    .coordinates()
                    .map(|home| self.options.drive_leg(distance_miles(last.coordinates, home)));
            }
        }

        Ok(OptimizedRoute::from_legs(ordered, legs, return_leg, PlanSource::Provider))
    }

    fn fallback(&self, mut candidates: Vec<ScoredStop>) -> OptimizedRoute {
        candidates.sort_by_key(|c| c.input_index);
        let legs = vec![self.options.fallback_leg(); candidates.len()];
        let stops = candidates.into_iter().map(|c| c.stop).collect();
        OptimizedRoute::from_legs(stops, legs, None, PlanSource::Fallback)
    }
}

fn validate_response(
    waypoint_count: usize,
    waypoint_order: &[usize],
    leg_count: usize,
) -> Result<(), ProviderError> {
    let mut seen = vec![false; waypoint_count];
    let is_permutation = waypoint_order.len() == waypoint_count
        && waypoint_order.iter().all(|&i| {
            i < waypoint_count && !std::mem::replace(&mut seen[i], true)
        });
    if !is_permutation {
        return Err(ProviderError::Malformed(format!(
            "waypoint_order {waypoint_order:?} is not a permutation of {waypoint_count} waypoints"
        )));
    }
    if leg_count != waypoint_count + 1 {
        return Err(ProviderError::Malformed(format!(
            "expected {} legs, got {leg_count}",
            waypoint_count + 1
        )));
    }
    Ok(())
}
