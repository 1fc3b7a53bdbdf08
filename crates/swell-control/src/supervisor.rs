//! The control-loop supervisor.
//!
//! One supervisor owns every control loop in the process. Its life is a
//! cycle of Building and Running: read the whole configuration
//! collection, build a loop per active entry, run them all under one
//! shutdown channel, and tear the whole set down again on the next
//! configuration change. The first non-cancellation failure from any
//! loop stops every sibling and surfaces as the supervisor's result;
//! the daemon exits on it.
//!
//! Before the first build the supervisor blocks until the
//! configuration source has delivered at least one change event, which
//! is the source's way of confirming it is reachable.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use swell_config::{ConfigEvent, ConfigStore, StoreError, WorkloadConfig};

use crate::control_loop::{ControlLoop, LoopError};
use crate::factory::{ControlLoopFactory, FactoryError};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("reading configuration collection: {0}")]
    Read(#[source] StoreError),

    #[error("parsing configuration entry `{name}`: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("building control loop for entry `{name}`: {source}")]
    Build {
        name: String,
        #[source]
        source: FactoryError,
    },

    #[error("watching configuration source: {0}")]
    Watch(#[source] StoreError),

    #[error(transparent)]
    Loop(#[from] LoopError),

    #[error("control loop task panicked: {0}")]
    Panic(String),
}

/// Owns the loop set and reacts to configuration changes.
pub struct Supervisor {
    store: Arc<dyn ConfigStore>,
    factory: ControlLoopFactory,
}

impl Supervisor {
    pub fn new(store: Arc<dyn ConfigStore>, factory: ControlLoopFactory) -> Self {
        Self { store, factory }
    }

    /// Run until a fatal error. Only returns `Err`; routine
    /// reconfiguration never terminates the supervisor.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let mut events = self.subscribe_ready().await?;

        loop {
            // Building: a fresh read, a fresh loop set. Any bad entry
            // aborts the whole cycle.
            let loops = self.build_all().await?;
            info!(count = loops.len(), "control loops built");

            let (shutdown_tx, _) = watch::channel(false);
            let mut tasks: JoinSet<Result<(), LoopError>> = JoinSet::new();
            for lp in loops {
                tasks.spawn(lp.run(shutdown_tx.subscribe()));
            }

            // Running: race the next config event against the first
            // loop termination.
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(Ok(())) => {
                            info!("configuration changed, rebuilding control loops");
                            shutdown_and_drain(&shutdown_tx, &mut tasks).await;
                            break;
                        }
                        Some(Err(err)) => {
                            shutdown_and_drain(&shutdown_tx, &mut tasks).await;
                            return Err(SupervisorError::Watch(err));
                        }
                        None => {
                            info!("configuration watch ended, resubscribing");
                            shutdown_and_drain(&shutdown_tx, &mut tasks).await;
                            events = self.subscribe_ready().await?;
                            break;
                        }
                    },
                    joined = tasks.join_next(), if !tasks.is_empty() => match joined {
                        Some(Ok(Ok(()))) => {
                            // Loops only return cleanly on shutdown;
                            // nobody signalled it yet.
                            warn!("control loop exited without a shutdown signal");
                        }
                        Some(Ok(Err(err))) => {
                            error!(error = %err, "control loop failed, stopping all loops");
                            shutdown_and_drain(&shutdown_tx, &mut tasks).await;
                            return Err(SupervisorError::Loop(err));
                        }
                        Some(Err(join_err)) => {
                            shutdown_and_drain(&shutdown_tx, &mut tasks).await;
                            return Err(SupervisorError::Panic(join_err.to_string()));
                        }
                        None => {}
                    },
                }
            }
        }
    }

    /// Subscribe and block until the source's first event proves it
    /// reachable.
    async fn subscribe_ready(&self) -> Result<mpsc::Receiver<ConfigEvent>, SupervisorError> {
        let mut events = self
            .store
            .subscribe()
            .await
            .map_err(SupervisorError::Watch)?;
        match events.recv().await {
            Some(Ok(())) => Ok(events),
            Some(Err(err)) => Err(SupervisorError::Watch(err)),
            None => Err(SupervisorError::Watch(StoreError::Watch(
                "configuration watch closed before its first event".to_string(),
            ))),
        }
    }

    /// Read the collection and build a loop for every active entry.
    async fn build_all(&self) -> Result<Vec<ControlLoop>, SupervisorError> {
        let entries = self.store.read_all().await.map_err(SupervisorError::Read)?;

        let mut loops = Vec::new();
        for (name, raw) in &entries {
            let common: WorkloadConfig =
                serde_json::from_str(raw).map_err(|source| SupervisorError::Parse {
                    name: name.clone(),
                    source,
                })?;
            if !common.active {
                debug!(entry = %name, "skipping inactive entry");
                continue;
            }
            let lp = self
                .factory
                .build(&common.backend, raw)
                .map_err(|source| SupervisorError::Build {
                    name: name.clone(),
                    source,
                })?;
            loops.push(lp);
        }
        Ok(loops)
    }
}

/// Signal shutdown and wait for every task of the current generation
/// to exit. The next generation must not start while any old loop can
/// still touch its workload, so this drains the set completely.
async fn shutdown_and_drain(
    shutdown_tx: &watch::Sender<bool>,
    tasks: &mut JoinSet<Result<(), LoopError>>,
) {
    let _ = shutdown_tx.send(true);
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "control loop reported an error while stopping")
            }
            Err(join_err) if join_err.is_cancelled() => {}
            Err(join_err) => {
                warn!(error = %join_err, "control loop task aborted while stopping")
            }
        }
    }
}
