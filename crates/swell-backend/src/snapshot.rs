//! Metrics snapshots.

use std::collections::HashMap;

/// The well-known key every successful collection carries: the
/// aggregate number of messages waiting across the workload's queues.
pub const BACKLOG_METRIC: &str = "msgs_in_queue";

/// One collection result: metric name to value.
///
/// Values are carried as decimal text so every backend transports its
/// numbers uniformly; the decision engine parses them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    values: HashMap<String, String>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot carrying only the aggregate backlog depth.
    pub fn from_backlog(count: u64) -> Self {
        let mut snapshot = Self::new();
        snapshot.set(BACKLOG_METRIC, count.to_string());
        snapshot
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The aggregate backlog value, if present.
    pub fn backlog(&self) -> Option<&str> {
        self.get(BACKLOG_METRIC)
    }
}
