//! swell-engine — the scaling decision algorithm.
//!
//! One pure function: a metrics snapshot plus the workload's bounds and
//! divisor in, a replica count out.
//!
//! ```text
//! raw = backlog / msgs_per_replica        (real division)
//!
//! raw > max  ->  max                      (clamp, no rounding)
//! raw < min  ->  min                      (clamp, no rounding)
//! else       ->  ceil(raw)
//! ```
//!
//! The clamp is checked before rounding on purpose: a boundary replica
//! count is returned verbatim even when `raw` has a fractional part
//! past the boundary; only interior values are rounded up.

use thiserror::Error;

use swell_backend::{BACKLOG_METRIC, MetricsSnapshot};

/// Errors a decision can produce.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("metrics snapshot is missing a numeric `{BACKLOG_METRIC}` value")]
    MetricsMissingOrMalformed,

    #[error("messages-per-replica divisor must be positive, got {0}")]
    InvalidDivisor(i64),
}

/// The decision parameters for one workload, captured at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionEngine {
    min: i32,
    max: i32,
    msgs_per_replica: i64,
}

impl DecisionEngine {
    pub fn new(min: i32, max: i32, msgs_per_replica: i64) -> Self {
        Self {
            min,
            max,
            msgs_per_replica,
        }
    }

    /// Decide the replica count for one snapshot.
    pub fn decide(&self, snapshot: &MetricsSnapshot) -> Result<i32, DecisionError> {
        desired_replicas(snapshot, self.min, self.max, self.msgs_per_replica)
    }
}

/// Read the aggregate backlog depth out of a snapshot.
pub fn backlog_depth(snapshot: &MetricsSnapshot) -> Result<f64, DecisionError> {
    let value: f64 = snapshot
        .backlog()
        .and_then(|raw| raw.parse().ok())
        .ok_or(DecisionError::MetricsMissingOrMalformed)?;
    // `"NaN"` and `"inf"` parse as f64 but are not counts.
    if !value.is_finite() {
        return Err(DecisionError::MetricsMissingOrMalformed);
    }
    Ok(value)
}

/// The decision algorithm. Pure and deterministic; safe to call from
/// any number of concurrent loops.
pub fn desired_replicas(
    snapshot: &MetricsSnapshot,
    min: i32,
    max: i32,
    msgs_per_replica: i64,
) -> Result<i32, DecisionError> {
    let backlog = backlog_depth(snapshot)?;
    if msgs_per_replica <= 0 {
        return Err(DecisionError::InvalidDivisor(msgs_per_replica));
    }

    let raw = backlog / msgs_per_replica as f64;
    if raw > max as f64 {
        Ok(max)
    } else if raw < min as f64 {
        Ok(min)
    } else {
        Ok(raw.ceil() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(backlog: &str) -> MetricsSnapshot {
        let mut s = MetricsSnapshot::new();
        s.set(BACKLOG_METRIC, backlog);
        s
    }

    #[test]
    fn interior_values_round_up() {
        // 250 / 100 = 2.5, interior of [1, 5].
        assert_eq!(desired_replicas(&snapshot("250"), 1, 5, 100), Ok(3));
    }

    #[test]
    fn above_max_clamps_without_rounding() {
        // 10000 / 100 = 100 > 5.
        assert_eq!(desired_replicas(&snapshot("10000"), 1, 5, 100), Ok(5));
        // 501 / 100 = 5.01: barely past the boundary still returns max
        // verbatim, not ceil(5.01) = 6.
        assert_eq!(desired_replicas(&snapshot("501"), 1, 5, 100), Ok(5));
    }

    #[test]
    fn below_min_clamps_without_rounding() {
        // 5 / 100 = 0.05 < 2.
        assert_eq!(desired_replicas(&snapshot("5"), 2, 5, 100), Ok(2));
        // 199 / 100 = 1.99: ceil would hit min anyway, but the clamp
        // path returns it directly.
        assert_eq!(desired_replicas(&snapshot("199"), 2, 5, 100), Ok(2));
    }

    #[test]
    fn exact_boundaries_pass_through() {
        // raw == max and raw == min take the interior path and survive
        // ceiling untouched.
        assert_eq!(desired_replicas(&snapshot("500"), 1, 5, 100), Ok(5));
        assert_eq!(desired_replicas(&snapshot("100"), 1, 5, 100), Ok(1));
    }

    #[test]
    fn exact_interior_integer_is_not_bumped() {
        assert_eq!(desired_replicas(&snapshot("200"), 1, 5, 100), Ok(2));
    }

    #[test]
    fn zero_backlog_returns_min() {
        assert_eq!(desired_replicas(&snapshot("0"), 1, 5, 100), Ok(1));
    }

    #[test]
    fn interior_results_stay_in_bounds() {
        for backlog in 0..2000 {
            let got = desired_replicas(&snapshot(&backlog.to_string()), 2, 7, 100).unwrap();
            assert!((2..=7).contains(&got), "backlog {backlog} gave {got}");
        }
    }

    #[test]
    fn fractional_backlog_text_is_accepted() {
        assert_eq!(desired_replicas(&snapshot("250.0"), 1, 5, 100), Ok(3));
    }

    #[test]
    fn non_positive_divisor_is_invalid_for_any_backlog() {
        for backlog in ["0", "1", "10000"] {
            assert_eq!(
                desired_replicas(&snapshot(backlog), 1, 5, 0),
                Err(DecisionError::InvalidDivisor(0))
            );
            assert_eq!(
                desired_replicas(&snapshot(backlog), 1, 5, -10),
                Err(DecisionError::InvalidDivisor(-10))
            );
        }
    }

    #[test]
    fn missing_backlog_is_malformed() {
        assert_eq!(
            desired_replicas(&MetricsSnapshot::new(), 1, 5, 100),
            Err(DecisionError::MetricsMissingOrMalformed)
        );
    }

    #[test]
    fn non_numeric_backlog_is_malformed() {
        for raw in ["lots", "", "NaN", "inf"] {
            assert_eq!(
                desired_replicas(&snapshot(raw), 1, 5, 100),
                Err(DecisionError::MetricsMissingOrMalformed),
                "backlog `{raw}`"
            );
        }
    }

    #[test]
    fn engine_captures_parameters() {
        let engine = DecisionEngine::new(1, 5, 100);
        assert_eq!(engine.decide(&snapshot("250")), Ok(3));
        assert_eq!(engine.decide(&snapshot("10000")), Ok(5));
    }
}
