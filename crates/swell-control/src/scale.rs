//! Applying a desired replica count to the workload.

use std::sync::Arc;

use async_trait::async_trait;

use swell_config::ScaleMethod;

/// Control-plane writes the loops need. Implemented against Kubernetes
/// in swell-kube; tests record calls instead.
#[async_trait]
pub trait ScaleExecutor: Send + Sync {
    /// Set the workload's replica count directly.
    async fn set_replicas(
        &self,
        namespace: &str,
        workload: &str,
        replicas: i32,
    ) -> anyhow::Result<()>;

    /// Set the workload autoscaler's min and max bounds.
    async fn pin_autoscaler_bounds(
        &self,
        namespace: &str,
        workload: &str,
        min: i32,
        max: i32,
    ) -> anyhow::Result<()>;
}

/// One workload's scaling action, bound to its configured method.
///
/// Idempotent: re-applying the same desired value is just a redundant
/// write.
pub struct ScaleAction {
    executor: Arc<dyn ScaleExecutor>,
    method: ScaleMethod,
    namespace: String,
    workload: String,
}

impl ScaleAction {
    pub fn new(
        executor: Arc<dyn ScaleExecutor>,
        method: ScaleMethod,
        namespace: &str,
        workload: &str,
    ) -> Self {
        Self {
            executor,
            method,
            namespace: namespace.to_string(),
            workload: workload.to_string(),
        }
    }

    /// Apply one desired replica count.
    ///
    /// The HPA method pins both bounds to the desired value, collapsing
    /// the autoscaler's range to a point. That is the configured
    /// contract, not an oversight.
    pub async fn apply(&self, desired: i32) -> anyhow::Result<()> {
        match self.method {
            ScaleMethod::HpaBounds => {
                self.executor
                    .pin_autoscaler_bounds(&self.namespace, &self.workload, desired, desired)
                    .await
            }
            ScaleMethod::Replicas => {
                self.executor
                    .set_replicas(&self.namespace, &self.workload, desired)
                    .await
            }
        }
    }
}
