//! ConfigMap-backed configuration store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::watcher::{Config, Event, watcher};
use kube::Client;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

use swell_config::{ConfigEvent, ConfigStore, StoreError};

/// Reads, writes, and watches one ConfigMap's data keys.
pub struct KubeConfigStore {
    client: Client,
    namespace: String,
    name: String,
}

impl KubeConfigStore {
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn api(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl ConfigStore for KubeConfigStore {
    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let cm = self
            .api()
            .get(&self.name)
            .await
            .map_err(|e| StoreError::Read(format!("configmap {}: {e}", self.name)))?;
        Ok(cm.data.unwrap_or_default())
    }

    async fn write_entry(&self, name: &str, raw: &str) -> Result<(), StoreError> {
        let patch = json!({"data": {name: raw}});
        self.api()
            .patch(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::Write(format!("configmap {}: {e}", self.name)))?;
        debug!(entry = %name, configmap = %self.name, "configuration entry written");
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<ConfigEvent>, StoreError> {
        let (tx, rx) = mpsc::channel(8);
        let api = self.api();
        let name = self.name.clone();

        tokio::spawn(async move {
            let config = Config::default().fields(&format!("metadata.name={name}"));
            let mut stream = watcher(api, config).boxed();
            info!(configmap = %name, "configuration watch started");

            while let Some(event) = stream.next().await {
                let signal = match event {
                    // InitDone means the initial sync finished: the
                    // source is reachable, whatever it held.
                    Ok(ev) if is_change(&ev) => Ok(()),
                    Ok(_) => continue,
                    Err(e) => Err(StoreError::Watch(e.to_string())),
                };
                if tx.send(signal).await.is_err() {
                    break; // subscriber gone
                }
            }
        });

        Ok(rx)
    }
}

/// Which watch events count as "the configuration (may have) changed".
fn is_change<K>(event: &Event<K>) -> bool {
    matches!(
        event,
        Event::InitDone | Event::Apply(_) | Event::Delete(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_events_do_not_signal() {
        assert!(!is_change(&Event::<ConfigMap>::Init));
        assert!(!is_change(&Event::InitApply(ConfigMap::default())));
    }

    #[test]
    fn sync_completion_and_mutations_signal() {
        assert!(is_change(&Event::<ConfigMap>::InitDone));
        assert!(is_change(&Event::Apply(ConfigMap::default())));
        assert!(is_change(&Event::Delete(ConfigMap::default())));
    }
}
