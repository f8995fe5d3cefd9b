//! Active route tracking for a field worker's day.
//!
//! The tracker owns the single active [`Route`], records visits against it,
//! keeps an elapsed-time counter, and writes the whole record to its
//! [`RouteStore`] after every change so an interrupted day can be resumed.
//! A change whose save fails is rolled back and the error returned.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::model::{Route, RouteStop};
use crate::traits::{Clock, RouteStore, SystemClock};

/// Well-known storage key for the persisted active route.
pub const ACTIVE_ROUTE_KEY: &str = "active-route";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteStatus {
    /// Computed, nothing visited yet.
    Planning,
    InProgress,
    /// Every stop visited.
    Completed,
}

/// Result of an operation guarded by a user confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Applied,
    /// The user declined; nothing changed.
    Declined,
}

/// Everything persisted for the active route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRouteRecord {
    pub route: Route,
    #[serde(default)]
    pub elapsed_minutes: u32,
    #[serde(default)]
    pub timer_running: bool,
    /// Start of the minute currently being accumulated.
    #[serde(default)]
    pub timer_anchor: Option<DateTime<Utc>>,
}

impl ActiveRouteRecord {
    /// Wraps a freshly generated route; `now` stamps a route that arrives
    /// already fully visited.
    pub fn new(route: Route, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            route,
            elapsed_minutes: 0,
            timer_running: false,
            timer_anchor: None,
        };
        record.normalize(now);
        record
    }

    pub fn status(&self) -> RouteStatus {
        if self.route.all_visited() {
            RouteStatus::Completed
        } else if self.route.visited_count() > 0 {
            RouteStatus::InProgress
        } else {
            RouteStatus::Planning
        }
    }

    /// Restores the completion and pointer invariants on data from outside.
    fn normalize(&mut self, now: DateTime<Utc>) {
        if !self.route.all_visited() {
            self.route.completed_at = None;
        } else if self.route.completed_at.is_none() {
            self.route.completed_at = Some(now);
        }
        self.route.current_stop_index = self.route.current_stop_index.min(self.route.last_index());
        if !self.timer_running {
            self.timer_anchor = None;
        }
    }

    /// Adds the whole minutes elapsed since the anchor. Returns true if the
    /// counter moved. Sub-minute remainders carry over to the next call.
    fn accumulate(&mut self, now: DateTime<Utc>) -> bool {
        if !self.timer_running {
            return false;
        }
        let Some(anchor) = self.timer_anchor else {
            self.timer_anchor = Some(now);
            return true;
        };

        let whole = (now - anchor).num_minutes();
        if whole <= 0 {
            return false;
        }
        let whole = u32::try_from(whole).unwrap_or(u32::MAX);
        self.elapsed_minutes = self.elapsed_minutes.saturating_add(whole);
        self.timer_anchor = Some(anchor + Duration::minutes(i64::from(whole)));
        true
    }

    fn stop_timer(&mut self, now: DateTime<Utc>) {
        self.accumulate(now);
        self.timer_running = false;
        self.timer_anchor = None;
    }
}

/// Snapshot of how far through the route the worker is.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteProgress {
    pub status: RouteStatus,
    pub visited: usize,
    pub total: usize,
    pub current_stop_index: usize,
    pub remaining_miles: f64,
    pub remaining_minutes: f64,
    pub elapsed_minutes: u32,
}

pub struct ActiveRouteTracker<S, C = SystemClock> {
    store: S,
    clock: C,
    record: Option<ActiveRouteRecord>,
}

impl<S: RouteStore> ActiveRouteTracker<S, SystemClock> {
    /// Loads any persisted route from `store`.
    pub fn init(store: S) -> Result<Self, TrackerError> {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: RouteStore, C: Clock> ActiveRouteTracker<S, C> {
    pub fn with_clock(store: S, clock: C) -> Result<Self, TrackerError> {
        let now = clock.now();
        let record = store.load()?.map(|mut record| {
            record.normalize(now);
            record
        });
        match &record {
            Some(record) => info!(
                route = %record.route.id,
                visited = record.route.visited_count(),
                total = record.route.stops.len(),
                "resuming persisted route"
            ),
            None => debug!("no persisted route"),
        }
        Ok(Self {
            store,
            clock,
            record,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn has_route(&self) -> bool {
        self.record.is_some()
    }

    pub fn route(&self) -> Result<&Route, TrackerError> {
        Ok(&self.record()?.route)
    }

    pub fn record(&self) -> Result<&ActiveRouteRecord, TrackerError> {
        self.record.as_ref().ok_or(TrackerError::NoActiveRoute)
    }

    pub fn status(&self) -> Result<RouteStatus, TrackerError> {
        Ok(self.record()?.status())
    }

    pub fn current_stop(&self) -> Result<Option<&RouteStop>, TrackerError> {
        let route = self.route()?;
        Ok(route.stops.get(route.current_stop_index))
    }

    /// Installs a freshly generated route.
    ///
    /// Replacing an unfinished route needs `confirm_discard` to agree.
    pub fn start<F>(&mut self, route: Route, confirm_discard: F) -> Result<ConfirmOutcome, TrackerError>
    where
        F: FnOnce(&Route) -> bool,
    {
        if let Some(existing) = &self.record {
            if existing.status() != RouteStatus::Completed && !confirm_discard(&existing.route) {
                debug!(route = %existing.route.id, "kept unfinished route");
                return Ok(ConfirmOutcome::Declined);
            }
        }

        info!(route = %route.id, stops = route.stops.len(), "starting route");
        let record = ActiveRouteRecord::new(route, self.clock.now());
        self.store.save(&record)?;
        self.record = Some(record);
        Ok(ConfirmOutcome::Applied)
    }

    pub fn mark_visited(&mut self, index: usize) -> Result<RouteStatus, TrackerError> {
        self.update(|record, now| {
            check_index(&record.route, index)?;

            record.route.stops[index].visited = true;
            record.route.current_stop_index = (index + 1).min(record.route.last_index());

            if record.route.all_visited() && record.route.completed_at.is_none() {
                record.route.completed_at = Some(now);
                record.stop_timer(now);
                info!(
                    route = %record.route.id,
                    elapsed_minutes = record.elapsed_minutes,
                    "route completed"
                );
            }
            Ok(record.status())
        })
    }

    /// Does not move the current-stop pointer back.
    pub fn mark_unvisited(&mut self, index: usize) -> Result<RouteStatus, TrackerError> {
        self.update(|record, _| {
            check_index(&record.route, index)?;

            record.route.stops[index].visited = false;
            if record.route.completed_at.take().is_some() {
                debug!(route = %record.route.id, "route reopened");
            }
            Ok(record.status())
        })
    }

    /// Points the tracker at another stop; out-of-range values are clamped.
    pub fn select_stop(&mut self, index: usize) -> Result<usize, TrackerError> {
        self.update(|record, _| {
            record.route.current_stop_index = index.min(record.route.last_index());
            Ok(record.route.current_stop_index)
        })
    }

    /// Back to planning: nothing visited, pointer at the start, timer cleared.
    pub fn reset(&mut self) -> Result<(), TrackerError> {
        self.update(|record, _| {
            for stop in &mut record.route.stops {
                stop.visited = false;
            }
            record.route.current_stop_index = 0;
            record.route.completed_at = None;
            record.elapsed_minutes = 0;
            record.timer_running = false;
            record.timer_anchor = None;
            Ok(())
        })
    }

    pub fn start_timer(&mut self) -> Result<(), TrackerError> {
        self.update(|record, now| {
            if !record.timer_running {
                record.timer_running = true;
                record.timer_anchor = Some(now);
            }
            Ok(())
        })
    }

    /// Stops the timer. Any partial minute is dropped.
    pub fn pause_timer(&mut self) -> Result<u32, TrackerError> {
        self.update(|record, now| {
            if record.timer_running {
                record.stop_timer(now);
            }
            Ok(record.elapsed_minutes)
        })
    }

    /// Caller-driven clock tick; folds whole elapsed minutes into the counter.
    pub fn tick(&mut self) -> Result<u32, TrackerError> {
        self.update(|record, now| {
            record.accumulate(now);
            Ok(record.elapsed_minutes)
        })
    }

    pub fn elapsed_minutes(&self) -> Result<u32, TrackerError> {
        Ok(self.record()?.elapsed_minutes)
    }

    pub fn timer_running(&self) -> Result<bool, TrackerError> {
        Ok(self.record()?.timer_running)
    }

    pub fn progress(&self) -> Result<RouteProgress, TrackerError> {
        let record = self.record()?;
        let route = &record.route;
        let (remaining_miles, remaining_minutes) = route
            .stops
            .iter()
            .filter(|stop| !stop.visited)
            .fold((0.0, 0.0), |(miles, minutes), stop| {
                (
                    miles + stop.distance_from_previous,
                    minutes + stop.estimated_minutes_from_previous,
                )
            });

        Ok(RouteProgress {
            status: record.status(),
            visited: route.visited_count(),
            total: route.stops.len(),
            current_stop_index: route.current_stop_index,
            remaining_miles,
            remaining_minutes,
            elapsed_minutes: record.elapsed_minutes,
        })
    }

    /// Discards the active route and its persisted record.
    ///
    /// An unfinished route is only discarded if `confirm` agrees.
    pub fn close<F>(&mut self, confirm: F) -> Result<ConfirmOutcome, TrackerError>
    where
        F: FnOnce(&Route) -> bool,
    {
        let record = self.record()?;
        if record.status() != RouteStatus::Completed && !confirm(&record.route) {
            return Ok(ConfirmOutcome::Declined);
        }

        info!(route = %record.route.id, "closing route");
        self.store.clear()?;
        self.record = None;
        Ok(ConfirmOutcome::Applied)
    }

    /// Applies `change` to the active record and saves it if anything moved.
    ///
    /// If the save fails the record is restored, so memory never runs ahead
    /// of the store.
    fn update<T, F>(&mut self, change: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&mut ActiveRouteRecord, DateTime<Utc>) -> Result<T, TrackerError>,
    {
        let now = self.clock.now();
        let record = self.record.as_mut().ok_or(TrackerError::NoActiveRoute)?;
        let before = record.clone();

        let value = change(record, now)?;
        if *record == before {
            return Ok(value);
        }

        if let Err(err) = self.store.save(record) {
            warn!(route = %before.route.id, error = %err, "route save failed, change rolled back");
            *record = before;
            return Err(err.into());
        }
        debug!(route = %record.route.id, "route saved");
        Ok(value)
    }
}

fn check_index(route: &Route, index: usize) -> Result<(), TrackerError> {
    if index < route.stops.len() {
        Ok(())
    } else {
        Err(TrackerError::StopOutOfRange {
            index,
            len: route.stops.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinates, Leg, OptimizedRoute, PlanSource, Stop};
    use chrono::TimeZone;

    fn record(stop_count: usize) -> ActiveRouteRecord {
        let stops = (0..stop_count)
            .map(|i| Stop::new(format!("p{i}"), Coordinates::new(36.0, -115.0), format!("{i} Sage Ct")))
            .collect();
        let optimized = OptimizedRoute::from_legs(
            stops,
            vec![Leg::estimate(1.0, 5.0); stop_count],
            None,
            PlanSource::Local,
        );
        let now = Utc::now();
        ActiveRouteRecord::new(Route::from_optimized(&optimized, "Shop", "Shop", now), now)
    }

    fn at(minutes: i64, seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(minutes * 60 + seconds, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn accumulate_counts_whole_minutes_and_carries_remainder() {
        let mut record = record(2);
        record.timer_running = true;
        record.timer_anchor = Some(at(0, 0));

        assert!(!record.accumulate(at(0, 59)));
        assert!(record.accumulate(at(2, 30)));
        assert_eq!(record.elapsed_minutes, 2);
        assert_eq!(record.timer_anchor, Some(at(2, 0)));

        assert!(record.accumulate(at(3, 0)));
        assert_eq!(record.elapsed_minutes, 3);
    }

    #[test]
    fn accumulate_ignores_stopped_timer() {
        let mut record = record(1);

        assert!(!record.accumulate(at(10, 0)));
        assert_eq!(record.elapsed_minutes, 0);
    }

    #[test]
    fn accumulate_ignores_clock_going_backwards() {
        let mut record = record(1);
        record.timer_running = true;
        record.timer_anchor = Some(at(5, 0));

        assert!(!record.accumulate(at(1, 0)));
        assert_eq!(record.elapsed_minutes, 0);
    }

    #[test]
    fn normalize_clamps_pointer_and_clears_stale_completion() {
        let mut record = record(3);
        record.route.current_stop_index = 10;
        record.route.completed_at = Some(at(0, 0));

        record.normalize(at(9, 0));

        assert_eq!(record.route.current_stop_index, 2);
        assert!(record.route.completed_at.is_none());
    }

    #[test]
    fn normalize_stamps_completed_route_with_given_time() {
        let mut record = record(2);
        for stop in &mut record.route.stops {
            stop.visited = true;
        }

        record.normalize(at(42, 0));

        assert_eq!(record.route.completed_at, Some(at(42, 0)));
    }

    #[test]
    fn status_follows_visited_flags() {
        let mut record = record(2);
        assert_eq!(record.status(), RouteStatus::Planning);

        record.route.stops[0].visited = true;
        assert_eq!(record.status(), RouteStatus::InProgress);

        record.route.stops[1].visited = true;
        assert_eq!(record.status(), RouteStatus::Completed);
    }
}
