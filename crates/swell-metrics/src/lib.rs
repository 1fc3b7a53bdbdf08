//! swell-metrics — the process-wide gauge registry.
//!
//! Every control loop exports two gauges: the latest observed backlog
//! and the latest decided replica count. Gauges are keyed by
//! `(namespace, workload, kind)` and live for the process lifetime:
//! when the supervisor rebuilds its loops, the new loop for a workload
//! gets the same underlying gauge back, so the scrape endpoint never
//! sees a gap or a duplicate.
//!
//! The registry is an owned value passed by reference to whoever needs
//! it, not a process global, so every test can run an isolated
//! instance.

use std::collections::HashMap;

use parking_lot::Mutex;
use prometheus::{Encoder, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::debug;

pub use prometheus::Gauge;

/// What a gauge measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Messages waiting across the workload's queues.
    Backlog,
    /// The replica count the engine last decided.
    Decision,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Backlog => "backlog",
            MetricKind::Decision => "decision",
        }
    }
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("gauge registration failed: {0}")]
    Register(#[from] prometheus::Error),

    #[error("exposition encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GaugeKey {
    namespace: String,
    workload: String,
    kind: MetricKind,
}

/// Idempotent registry of per-workload gauges.
pub struct GaugeRegistry {
    registry: Registry,
    gauges: Mutex<HashMap<GaugeKey, Gauge>>,
}

impl Default for GaugeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            gauges: Mutex::new(HashMap::new()),
        }
    }

    /// Get the gauge for a key, creating and registering it on first
    /// use. Asking for an existing key returns the existing gauge;
    /// never an error, never a duplicate registration.
    pub fn gauge(
        &self,
        namespace: &str,
        workload: &str,
        kind: MetricKind,
    ) -> Result<Gauge, MetricsError> {
        let key = GaugeKey {
            namespace: namespace.to_string(),
            workload: workload.to_string(),
            kind,
        };

        let mut gauges = self.gauges.lock();
        if let Some(gauge) = gauges.get(&key) {
            return Ok(gauge.clone());
        }

        let opts = Opts::new("swell_autoscaler", "Swell backlog autoscaler").const_labels(
            HashMap::from([
                ("namespace".to_string(), namespace.to_string()),
                ("workload".to_string(), workload.to_string()),
                ("kind".to_string(), kind.as_str().to_string()),
            ]),
        );
        let gauge = Gauge::with_opts(opts)?;
        self.registry.register(Box::new(gauge.clone()))?;
        gauges.insert(key, gauge.clone());
        debug!(%namespace, %workload, kind = kind.as_str(), "gauge registered");
        Ok(gauge)
    }

    /// Render every registered gauge in the Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| MetricsError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_the_same_gauge() {
        let registry = GaugeRegistry::new();
        let first = registry
            .gauge("jobs", "mail-worker", MetricKind::Backlog)
            .unwrap();
        let second = registry
            .gauge("jobs", "mail-worker", MetricKind::Backlog)
            .unwrap();

        first.set(42.0);
        assert_eq!(second.get(), 42.0);
    }

    #[test]
    fn kinds_are_distinct_gauges() {
        let registry = GaugeRegistry::new();
        let backlog = registry
            .gauge("jobs", "mail-worker", MetricKind::Backlog)
            .unwrap();
        let decision = registry
            .gauge("jobs", "mail-worker", MetricKind::Decision)
            .unwrap();

        backlog.set(500.0);
        decision.set(5.0);
        assert_eq!(backlog.get(), 500.0);
        assert_eq!(decision.get(), 5.0);
    }

    #[test]
    fn workloads_are_distinct_gauges() {
        let registry = GaugeRegistry::new();
        let a = registry.gauge("jobs", "a", MetricKind::Backlog).unwrap();
        let b = registry.gauge("jobs", "b", MetricKind::Backlog).unwrap();
        a.set(1.0);
        assert_eq!(b.get(), 0.0);
    }

    #[test]
    fn render_carries_identity_labels() {
        let registry = GaugeRegistry::new();
        registry
            .gauge("jobs", "mail-worker", MetricKind::Backlog)
            .unwrap()
            .set(120.0);

        let text = registry.render().unwrap();
        assert!(text.contains("swell_autoscaler"));
        assert!(text.contains("namespace=\"jobs\""));
        assert!(text.contains("workload=\"mail-worker\""));
        assert!(text.contains("kind=\"backlog\""));
        assert!(text.contains("120"));
    }

    #[test]
    fn registries_are_isolated() {
        let one = GaugeRegistry::new();
        let two = GaugeRegistry::new();
        one.gauge("jobs", "w", MetricKind::Backlog).unwrap().set(7.0);
        assert!(!two.render().unwrap().contains("jobs"));
    }
}
