//! Error types for configuration parsing and the config store.

use thiserror::Error;

/// Errors produced while validating a configuration entry.
///
/// All of these are construction-time errors: an entry that fails
/// validation never becomes a control loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("min replicas {min} exceeds max replicas {max}")]
    BoundsInverted { min: i32, max: i32 },

    #[error("replica bounds must be non-negative (min {min}, max {max})")]
    NegativeBounds { min: i32, max: i32 },

    #[error("msgs_per_pod must be positive, got {0}")]
    BadDivisor(i64),

    #[error("invalid poll interval `{0}`")]
    BadInterval(String),
}

/// Errors produced by a [`crate::ConfigStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading configuration collection: {0}")]
    Read(String),

    #[error("writing configuration entry: {0}")]
    Write(String),

    #[error("watching configuration source: {0}")]
    Watch(String),

    #[error("configuration entry `{0}` not found")]
    NotFound(String),
}
