//! swell-kube — Kubernetes adapters for the Swell autoscaler.
//!
//! Two thin adapters over the cluster API:
//!
//! - [`KubeConfigStore`] backs the [`swell_config::ConfigStore`]
//!   contract with a ConfigMap: entries are the map's data keys, and a
//!   ConfigMap watch feeds the supervisor's change events.
//! - [`KubeScaleExecutor`] backs the [`swell_control::ScaleExecutor`]
//!   contract with merge patches against Deployments and
//!   HorizontalPodAutoscalers.

pub mod config_map;
pub mod scaler;

pub use config_map::KubeConfigStore;
pub use scaler::KubeScaleExecutor;

use anyhow::Context;
use kube::Client;

/// Build a client from the environment (in-cluster service account or
/// local kubeconfig) and report its default namespace.
pub async fn connect() -> anyhow::Result<(Client, String)> {
    let client = Client::try_default()
        .await
        .context("building kubernetes client")?;
    let namespace = client.default_namespace().to_string();
    Ok((client, namespace))
}
