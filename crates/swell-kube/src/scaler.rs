//! Workload scaling over the Kubernetes API.

use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::{Value, json};
use tracing::debug;

use swell_control::ScaleExecutor;

/// Applies replica counts with merge patches. Both writes are
/// idempotent: patching in the current value is a no-op for the
/// workload.
pub struct KubeScaleExecutor {
    client: Client,
}

impl KubeScaleExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScaleExecutor for KubeScaleExecutor {
    async fn set_replicas(
        &self,
        namespace: &str,
        workload: &str,
        replicas: i32,
    ) -> anyhow::Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            workload,
            &PatchParams::default(),
            &Patch::Merge(replicas_patch(replicas)),
        )
        .await
        .with_context(|| format!("scaling deployment {namespace}/{workload}"))?;
        debug!(%namespace, %workload, replicas, "deployment replicas set");
        Ok(())
    }

    async fn pin_autoscaler_bounds(
        &self,
        namespace: &str,
        workload: &str,
        min: i32,
        max: i32,
    ) -> anyhow::Result<()> {
        let api: Api<HorizontalPodAutoscaler> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            workload,
            &PatchParams::default(),
            &Patch::Merge(hpa_bounds_patch(min, max)),
        )
        .await
        .with_context(|| format!("updating hpa {namespace}/{workload}"))?;
        debug!(%namespace, %workload, min, max, "hpa bounds set");
        Ok(())
    }
}

fn replicas_patch(replicas: i32) -> Value {
    json!({"spec": {"replicas": replicas}})
}

fn hpa_bounds_patch(min: i32, max: i32) -> Value {
    json!({"spec": {"minReplicas": min, "maxReplicas": max}})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicas_patch_shape() {
        assert_eq!(replicas_patch(4), json!({"spec": {"replicas": 4}}));
    }

    #[test]
    fn hpa_patch_sets_both_bounds() {
        assert_eq!(
            hpa_bounds_patch(3, 3),
            json!({"spec": {"minReplicas": 3, "maxReplicas": 3}})
        );
    }
}
