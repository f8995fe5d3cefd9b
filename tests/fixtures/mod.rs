//! Test fixtures for field-route-planner.
//!
//! Provides:
//! - Real Henderson, NV permit locations
//! - Stub routing providers that record what they were asked

#![allow(dead_code)]

pub mod henderson_permits;
pub mod providers;

pub use henderson_permits::*;
pub use providers::*;
