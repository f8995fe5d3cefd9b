//! Error types for provider calls, persistence, and the route tracker.

use thiserror::Error;

/// Failure talking to the external routing provider.
///
/// The optimizer never surfaces these to its caller; they select a
/// fallback path instead.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request to routing provider failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a top-level status other than `OK`.
    #[error("routing provider returned status {status}: {message}")]
    Status { status: String, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Failure reading or writing the persisted active route.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("route store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("route record could not be (de)serialized: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    /// The tracker was used before a route was loaded or supplied.
    #[error("no active route; generate one before tracking progress")]
    NoActiveRoute,

    #[error("stop index {index} is out of range for a route of {len} stops")]
    StopOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}
