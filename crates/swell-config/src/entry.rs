//! Workload configuration entries.
//!
//! Every entry in the configuration collection is a JSON object with a
//! common shape plus backend-specific fields. [`WorkloadConfig`]
//! captures the common shape; the control-loop factory deserializes the
//! full entry with the backend-specific fields flattened alongside it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a desired replica count is applied to the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMethod {
    /// Write the replica count directly onto the workload.
    #[default]
    Replicas,
    /// Pin the workload's horizontal autoscaler: min and max bounds are
    /// both set to the desired count, collapsing its range to a point.
    HpaBounds,
}

impl ScaleMethod {
    /// Parse the `scale_method` field. Exactly `"HPA"` selects bound
    /// pinning; every other value (including absent) selects the direct
    /// replica write.
    pub fn parse(label: &str) -> Self {
        if label == "HPA" {
            ScaleMethod::HpaBounds
        } else {
            ScaleMethod::Replicas
        }
    }
}

/// The common shape of one configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadConfig {
    /// Namespace the workload lives in.
    pub namespace: String,
    /// Name of the workload (Deployment / HPA name).
    pub deployment: String,
    /// Backend tag: which broker adapter measures the backlog.
    ///
    /// Kept as a raw string so the factory can report an unknown tag as
    /// its own error rather than a deserialization failure.
    #[serde(rename = "type")]
    pub backend: String,
    /// Upper replica bound.
    pub max: i32,
    /// Lower replica bound.
    pub min: i32,
    /// Scaling method label, see [`ScaleMethod::parse`].
    #[serde(default)]
    pub scale_method: String,
    /// Inactive entries are skipped when the supervisor builds loops.
    #[serde(default)]
    pub active: bool,
    /// Poll interval, e.g. `"30s"`, `"5m"`.
    pub interval: String,
}

impl WorkloadConfig {
    /// Check the invariants shared by every backend.
    ///
    /// Violations are construction-time errors, never runtime clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min < 0 || self.max < 0 {
            return Err(ConfigError::NegativeBounds {
                min: self.min,
                max: self.max,
            });
        }
        if self.min > self.max {
            return Err(ConfigError::BoundsInverted {
                min: self.min,
                max: self.max,
            });
        }
        self.poll_interval()?;
        Ok(())
    }

    /// The parsed scaling method.
    pub fn scale_method(&self) -> ScaleMethod {
        ScaleMethod::parse(&self.scale_method)
    }

    /// The parsed poll interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_interval(&self.interval)
    }
}

/// Parse an interval string like `"250ms"`, `"30s"`, `"5m"`, `"1h"`.
///
/// Bare digits are seconds. Zero and negative intervals are rejected: a
/// loop that never sleeps would hammer the broker.
pub fn parse_interval(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let bad = || ConfigError::BadInterval(s.to_string());

    let (digits, unit_ms) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1_000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1_000)
    };

    let value: u64 = digits.parse().map_err(|_| bad())?;
    if value == 0 {
        return Err(bad());
    }
    Ok(Duration::from_millis(value * unit_ms))
}
