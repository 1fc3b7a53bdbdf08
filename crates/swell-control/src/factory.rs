//! Building control loops from raw configuration entries.
//!
//! The factory is the single place that knows the set of supported
//! backends. Adding one means adding an entry shape, a collector, and
//! one dispatch arm here; the loop and supervisor stay untouched.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use swell_backend::BacklogCollector;
use swell_backend::pubsub::PubSubCollector;
use swell_backend::rabbitmq::RabbitMqCollector;
use swell_backend::sqs::SqsCollector;
use swell_config::{ConfigError, WorkloadConfig};
use swell_engine::DecisionEngine;
use swell_metrics::{GaugeRegistry, MetricKind, MetricsError};

use crate::control_loop::ControlLoop;
use crate::scale::{ScaleAction, ScaleExecutor};

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unknown backend type `{0}`")]
    UnknownBackendType(String),

    #[error("parsing configuration entry: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),

    #[error(transparent)]
    Gauge(#[from] MetricsError),
}

// ── Backend entry shapes ───────────────────────────────────────────

#[derive(Deserialize)]
struct SqsEntry {
    #[serde(flatten)]
    common: WorkloadConfig,
    key: String,
    secret: String,
    region: String,
    queue_urls: Vec<String>,
    msgs_per_pod: i64,
}

#[derive(Deserialize)]
struct PubSubEntry {
    #[serde(flatten)]
    common: WorkloadConfig,
    google_application_credentials: String,
    project: String,
    subscription_ids: Vec<String>,
    msgs_per_pod: i64,
}

#[derive(Deserialize)]
struct RabbitMqEntry {
    #[serde(flatten)]
    common: WorkloadConfig,
    credentials: String,
    queue_urls: Vec<String>,
    msgs_per_pod: i64,
}

// ── Factory ────────────────────────────────────────────────────────

/// Wires collectors, engines, actions, and gauges into loops.
pub struct ControlLoopFactory {
    gauges: Arc<GaugeRegistry>,
    executor: Arc<dyn ScaleExecutor>,
}

impl ControlLoopFactory {
    pub fn new(gauges: Arc<GaugeRegistry>, executor: Arc<dyn ScaleExecutor>) -> Self {
        Self { gauges, executor }
    }

    /// Build one loop from an entry's backend tag and raw JSON blob.
    pub fn build(&self, backend: &str, raw: &str) -> Result<ControlLoop, FactoryError> {
        match backend {
            "sqs" => {
                let entry: SqsEntry = serde_json::from_str(raw)?;
                let collector = SqsCollector::new(
                    &entry.key,
                    &entry.secret,
                    &entry.region,
                    entry.queue_urls,
                );
                self.assemble(entry.common, entry.msgs_per_pod, Box::new(collector))
            }
            "pubsub" => {
                let entry: PubSubEntry = serde_json::from_str(raw)?;
                let collector = PubSubCollector::new(
                    &entry.google_application_credentials,
                    &entry.project,
                    entry.subscription_ids,
                );
                self.assemble(entry.common, entry.msgs_per_pod, Box::new(collector))
            }
            "rabbitmq" => {
                let entry: RabbitMqEntry = serde_json::from_str(raw)?;
                let collector = RabbitMqCollector::new(&entry.credentials, entry.queue_urls);
                self.assemble(entry.common, entry.msgs_per_pod, Box::new(collector))
            }
            other => Err(FactoryError::UnknownBackendType(other.to_string())),
        }
    }

    fn assemble(
        &self,
        common: WorkloadConfig,
        msgs_per_pod: i64,
        collector: Box<dyn BacklogCollector>,
    ) -> Result<ControlLoop, FactoryError> {
        common.validate()?;
        if msgs_per_pod <= 0 {
            return Err(ConfigError::BadDivisor(msgs_per_pod).into());
        }
        let interval = common.poll_interval()?;

        let backlog_gauge =
            self.gauges
                .gauge(&common.namespace, &common.deployment, MetricKind::Backlog)?;
        let decision_gauge =
            self.gauges
                .gauge(&common.namespace, &common.deployment, MetricKind::Decision)?;

        let engine = DecisionEngine::new(common.min, common.max, msgs_per_pod);
        let action = ScaleAction::new(
            self.executor.clone(),
            common.scale_method(),
            &common.namespace,
            &common.deployment,
        );

        Ok(ControlLoop::new(
            common,
            interval,
            collector,
            engine,
            action,
            backlog_gauge,
            decision_gauge,
        ))
    }
}
