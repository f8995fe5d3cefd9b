//! field-route-planner core
//!
//! Orders door-to-door lead stops into a single-driver route and tracks a
//! field worker's progress through it.

pub mod traits;
pub mod error;
pub mod model;
pub mod haversine;
pub mod distance_matrix;
pub mod google_maps;
pub mod optimizer;
pub mod tracker;
pub mod store;
