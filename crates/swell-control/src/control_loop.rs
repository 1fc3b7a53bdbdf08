//! The per-workload control loop.
//!
//! A loop has two states, running and stopped. It runs until the
//! supervisor signals shutdown (a clean stop) or any step of a cycle
//! fails (a terminal error, reported upward). There is no in-loop
//! retry: recovery is always a full rebuild by the supervisor.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use swell_backend::{BacklogCollector, CollectorError, MetricsSnapshot};
use swell_config::WorkloadConfig;
use swell_engine::{DecisionEngine, DecisionError, backlog_depth};
use swell_metrics::Gauge;

use crate::scale::ScaleAction;

/// A terminal control-loop failure. Shutdown is not one of these;
/// cancelled loops return `Ok`.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("collecting backlog for {workload}: {source}")]
    Collect {
        workload: String,
        #[source]
        source: CollectorError,
    },

    #[error("deciding replicas for {workload}: {source}")]
    Decide {
        workload: String,
        #[source]
        source: DecisionError,
    },

    #[error("applying replica count for {workload}: {source}")]
    Apply {
        workload: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// One workload's collect → decide → apply loop.
pub struct ControlLoop {
    config: WorkloadConfig,
    interval: Duration,
    collector: Box<dyn BacklogCollector>,
    engine: DecisionEngine,
    action: ScaleAction,
    backlog_gauge: Gauge,
    decision_gauge: Gauge,
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("config", &self.config)
            .field("interval", &self.interval)
            .field("engine", &self.engine)
            .field("backlog_gauge", &self.backlog_gauge)
            .field("decision_gauge", &self.decision_gauge)
            .finish_non_exhaustive()
    }
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WorkloadConfig,
        interval: Duration,
        collector: Box<dyn BacklogCollector>,
        engine: DecisionEngine,
        action: ScaleAction,
        backlog_gauge: Gauge,
        decision_gauge: Gauge,
    ) -> Self {
        Self {
            config,
            interval,
            collector,
            engine,
            action,
            backlog_gauge,
            decision_gauge,
        }
    }

    /// `namespace/name` identity for logs and errors.
    pub fn workload(&self) -> String {
        format!("{}/{}", self.config.namespace, self.config.deployment)
    }

    /// Run until shutdown or failure. Shutdown is observed at tick
    /// boundaries; an in-flight cycle finishes before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), LoopError> {
        info!(
            namespace = %self.config.namespace,
            workload = %self.config.deployment,
            interval = ?self.interval,
            "control loop started"
        );
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(
                        namespace = %self.config.namespace,
                        workload = %self.config.deployment,
                        "control loop stopping"
                    );
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.cycle().await?;
                }
            }
        }
    }

    /// One collect → decide → apply pass.
    pub async fn cycle(&self) -> Result<(), LoopError> {
        let snapshot = self.collect().await?;

        let backlog = backlog_depth(&snapshot).map_err(|source| LoopError::Decide {
            workload: self.workload(),
            source,
        })?;
        self.backlog_gauge.set(backlog);

        let desired = self.engine.decide(&snapshot).map_err(|source| LoopError::Decide {
            workload: self.workload(),
            source,
        })?;
        self.decision_gauge.set(desired as f64);
        debug!(
            namespace = %self.config.namespace,
            workload = %self.config.deployment,
            backlog,
            desired,
            "replica decision"
        );

        self.action.apply(desired).await.map_err(|source| LoopError::Apply {
            workload: self.workload(),
            source: source.into(),
        })
    }

    async fn collect(&self) -> Result<MetricsSnapshot, LoopError> {
        self.collector
            .collect()
            .await
            .map_err(|source| LoopError::Collect {
                workload: self.workload(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use swell_metrics::{GaugeRegistry, MetricKind};

    use crate::scale::ScaleExecutor;

    fn test_config(interval: &str) -> WorkloadConfig {
        WorkloadConfig {
            namespace: "jobs".to_string(),
            deployment: "mail-worker".to_string(),
            backend: "sqs".to_string(),
            max: 5,
            min: 1,
            scale_method: String::new(),
            active: true,
            interval: interval.to_string(),
        }
    }

    struct SteadyCollector(u64);

    #[async_trait]
    impl BacklogCollector for SteadyCollector {
        async fn collect(&self) -> Result<MetricsSnapshot, CollectorError> {
            Ok(MetricsSnapshot::from_backlog(self.0))
        }
    }

    /// Pops one scripted result per collect call.
    struct SequenceCollector {
        results: Mutex<VecDeque<Result<MetricsSnapshot, CollectorError>>>,
    }

    impl SequenceCollector {
        fn new(results: Vec<Result<MetricsSnapshot, CollectorError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
            }
        }
    }

    #[async_trait]
    impl BacklogCollector for SequenceCollector {
        async fn collect(&self) -> Result<MetricsSnapshot, CollectorError> {
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .expect("collector called more times than scripted")
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ScaleCall {
        Replicas(String, String, i32),
        Bounds(String, String, i32, i32),
    }

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<ScaleCall>>,
    }

    impl RecordingExecutor {
        fn calls(&self) -> Vec<ScaleCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScaleExecutor for RecordingExecutor {
        async fn set_replicas(&self, ns: &str, wl: &str, replicas: i32) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(ScaleCall::Replicas(
                ns.to_string(),
                wl.to_string(),
                replicas,
            ));
            Ok(())
        }

        async fn pin_autoscaler_bounds(
            &self,
            ns: &str,
            wl: &str,
            min: i32,
            max: i32,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(ScaleCall::Bounds(
                ns.to_string(),
                wl.to_string(),
                min,
                max,
            ));
            Ok(())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl ScaleExecutor for FailingExecutor {
        async fn set_replicas(&self, _: &str, _: &str, _: i32) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("control plane write refused"))
        }

        async fn pin_autoscaler_bounds(&self, _: &str, _: &str, _: i32, _: i32) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("control plane write refused"))
        }
    }

    fn build_loop(
        config: WorkloadConfig,
        collector: Box<dyn BacklogCollector>,
        executor: Arc<dyn ScaleExecutor>,
        registry: &GaugeRegistry,
    ) -> ControlLoop {
        let interval = config.poll_interval().unwrap();
        let engine = DecisionEngine::new(config.min, config.max, 100);
        let action = ScaleAction::new(
            executor,
            config.scale_method(),
            &config.namespace,
            &config.deployment,
        );
        let backlog_gauge = registry
            .gauge(&config.namespace, &config.deployment, MetricKind::Backlog)
            .unwrap();
        let decision_gauge = registry
            .gauge(&config.namespace, &config.deployment, MetricKind::Decision)
            .unwrap();
        ControlLoop::new(
            config,
            interval,
            collector,
            engine,
            action,
            backlog_gauge,
            decision_gauge,
        )
    }

    #[tokio::test]
    async fn cycle_collects_decides_exports_and_applies() {
        let registry = GaugeRegistry::new();
        let executor = Arc::new(RecordingExecutor::default());
        let lp = build_loop(
            test_config("10ms"),
            Box::new(SteadyCollector(250)),
            executor.clone(),
            &registry,
        );

        lp.cycle().await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![ScaleCall::Replicas(
                "jobs".to_string(),
                "mail-worker".to_string(),
                3
            )]
        );
        let text = registry.render().unwrap();
        assert!(text.contains("kind=\"backlog\"")); // 250 exported
        assert!(text.contains("kind=\"decision\""));
        assert!(text.contains("250"));
    }

    #[tokio::test]
    async fn hpa_method_pins_both_bounds() {
        let registry = GaugeRegistry::new();
        let executor = Arc::new(RecordingExecutor::default());
        let mut config = test_config("10ms");
        config.scale_method = "HPA".to_string();
        let lp = build_loop(
            config,
            Box::new(SteadyCollector(10_000)),
            executor.clone(),
            &registry,
        );

        lp.cycle().await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![ScaleCall::Bounds(
                "jobs".to_string(),
                "mail-worker".to_string(),
                5,
                5
            )]
        );
    }

    #[tokio::test]
    async fn run_ticks_until_shutdown() {
        let registry = GaugeRegistry::new();
        let executor = Arc::new(RecordingExecutor::default());
        let lp = build_loop(
            test_config("10ms"),
            Box::new(SteadyCollector(250)),
            executor.clone(),
            &registry,
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(lp.run(rx));
        tokio::time::sleep(Duration::from_millis(55)).await;
        tx.send(true).unwrap();

        handle.await.unwrap().unwrap();
        let calls = executor.calls();
        assert!(!calls.is_empty());
        assert!(calls.iter().all(|c| matches!(
            c,
            ScaleCall::Replicas(_, _, 3)
        )));
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_is_clean() {
        let registry = GaugeRegistry::new();
        let executor = Arc::new(RecordingExecutor::default());
        let lp = build_loop(
            test_config("1h"),
            Box::new(SteadyCollector(250)),
            executor.clone(),
            &registry,
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(lp.run(rx));
        tx.send(true).unwrap();

        handle.await.unwrap().unwrap();
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn collector_failure_is_terminal() {
        let registry = GaugeRegistry::new();
        let executor = Arc::new(RecordingExecutor::default());
        let collector = SequenceCollector::new(vec![
            Ok(MetricsSnapshot::from_backlog(100)),
            Err(CollectorError::Request("broker unreachable".to_string())),
        ]);
        let lp = build_loop(
            test_config("10ms"),
            Box::new(collector),
            executor.clone(),
            &registry,
        );

        let (_tx, rx) = watch::channel(false);
        let err = lp.run(rx).await.unwrap_err();
        assert!(matches!(err, LoopError::Collect { .. }));
        // The first cycle still applied before the failure.
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn malformed_snapshot_is_terminal() {
        let registry = GaugeRegistry::new();
        let executor = Arc::new(RecordingExecutor::default());
        let collector = SequenceCollector::new(vec![Ok(MetricsSnapshot::new())]);
        let lp = build_loop(
            test_config("10ms"),
            Box::new(collector),
            executor.clone(),
            &registry,
        );

        let (_tx, rx) = watch::channel(false);
        let err = lp.run(rx).await.unwrap_err();
        assert!(matches!(
            err,
            LoopError::Decide {
                source: DecisionError::MetricsMissingOrMalformed,
                ..
            }
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn apply_failure_is_terminal() {
        let registry = GaugeRegistry::new();
        let lp = build_loop(
            test_config("10ms"),
            Box::new(SteadyCollector(250)),
            Arc::new(FailingExecutor),
            &registry,
        );

        let (_tx, rx) = watch::channel(false);
        let err = lp.run(rx).await.unwrap_err();
        assert!(matches!(err, LoopError::Apply { .. }));
    }
}
