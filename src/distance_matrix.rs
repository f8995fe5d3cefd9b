//! Batched origin-to-stops distance lookups.
//!
//! Splits destinations into provider-sized chunks, issues one request per
//! chunk in sequence, and merges what came back into a map keyed by stop id.
//! A failed chunk leaves its stops out of the map; it never aborts the rest.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::model::{Coordinates, Stop, TravelEstimate, Waypoint};
use crate::traits::{DistanceMatrixProvider, MAX_MATRIX_DESTINATIONS};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Destinations per request. Clamped to the provider hard limit.
    pub batch_size: usize,
    /// Courtesy pause between consecutive requests.
    pub pause_between_batches: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: MAX_MATRIX_DESTINATIONS,
            pause_between_batches: Duration::ZERO,
        }
    }
}

impl BatchOptions {
    fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_MATRIX_DESTINATIONS)
    }
}

/// Distances from `origin` to each stop, keyed by stop id.
///
/// A missing key means "unknown", never zero.
pub fn batch_distances<M>(
    provider: &M,
    origin: &Waypoint,
    destinations: &[Stop],
    options: &BatchOptions,
) -> HashMap<String, TravelEstimate>
where
    M: DistanceMatrixProvider + ?Sized,
{
    let mut results = HashMap::with_capacity(destinations.len());
    let batch_size = options.effective_batch_size();

    for (batch_index, chunk) in destinations.chunks(batch_size).enumerate() {
        if batch_index > 0 && !options.pause_between_batches.is_zero() {
            thread::sleep(options.pause_between_batches);
        }

        let coords: Vec<Coordinates> = chunk.iter().map(|stop| stop.coordinates).collect();
        let row = match provider.distance_row(origin, &coords) {
            Ok(row) => row,
            Err(err) => {
                warn!(batch = batch_index, size = chunk.len(), error = %err, "distance batch failed");
                continue;
            }
        };

        if row.len() != chunk.len() {
            debug!(
                batch = batch_index,
                expected = chunk.len(),
                received = row.len(),
                "distance batch returned a short row"
            );
        }

        for (stop, estimate) in chunk.iter().zip(row) {
            if let Some(estimate) = estimate {
                results.insert(stop.id.clone(), estimate);
            }
        }
    }

    debug!(
        requested = destinations.len(),
        resolved = results.len(),
        "distance batches merged"
    );
    results
}
