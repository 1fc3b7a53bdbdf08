//! The backlog collector contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::MetricsSnapshot;

/// Errors a backend adapter can report.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("backend request failed: {0}")]
    Request(String),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("backend authentication failed: {0}")]
    Auth(String),
}

/// Measures the backlog for one workload.
///
/// Implementations sum the backlog across every queue/subscription the
/// workload consumes. Any per-identifier failure fails the whole
/// collection.
#[async_trait]
pub trait BacklogCollector: Send + Sync {
    async fn collect(&self) -> Result<MetricsSnapshot, CollectorError>;
}
