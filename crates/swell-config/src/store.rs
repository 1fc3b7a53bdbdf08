//! The configuration store contract.
//!
//! The supervisor and the admin UI never talk to the orchestrator
//! directly; they consume this trait. The Kubernetes implementation
//! lives in swell-kube, tests use in-memory fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// One item on the change-notification stream: the configuration
/// changed, or the watch failed.
pub type ConfigEvent = Result<(), StoreError>;

/// External store holding the configuration collection.
///
/// The collection is a mapping from entry name to a raw JSON blob; the
/// store never interprets the blobs.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the full collection.
    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError>;

    /// Replace the raw blob of one entry.
    async fn write_entry(&self, name: &str, raw: &str) -> Result<(), StoreError>;

    /// Subscribe to change notifications.
    ///
    /// Once the source is confirmed reachable the stream delivers at
    /// least one event, then an event per subsequent change. The channel
    /// closing means the watch ended; subscribers are expected to
    /// resubscribe.
    async fn subscribe(&self) -> Result<mpsc::Receiver<ConfigEvent>, StoreError>;
}
