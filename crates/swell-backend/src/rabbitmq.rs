//! RabbitMQ backlog measurement.
//!
//! Each configured URL points at a queue resource on the management
//! API (`/api/queues/<vhost>/<name>`); the `messages` field is the
//! queue's total ready + unacknowledged count. Credentials are the
//! pre-encoded payload of a Basic Authorization header.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;

use crate::collector::{BacklogCollector, CollectorError};
use crate::snapshot::MetricsSnapshot;

pub struct RabbitMqCollector {
    http: reqwest::Client,
    credentials: String,
    queue_urls: Vec<String>,
}

impl RabbitMqCollector {
    pub fn new(credentials: &str, queue_urls: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials: credentials.to_string(),
            queue_urls,
        }
    }

    async fn queue_depth(&self, queue_url: &str) -> Result<u64, CollectorError> {
        let resp = self
            .http
            .get(queue_url)
            .header(AUTHORIZATION, format!("Basic {}", self.credentials))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CollectorError::Request(format!("rabbitmq {queue_url}: {e}")))?;

        let body: serde_json::Value = resp.json().await.map_err(|e| {
            CollectorError::MalformedResponse(format!("rabbitmq {queue_url}: {e}"))
        })?;
        message_count(&body)
            .map_err(|m| CollectorError::MalformedResponse(format!("rabbitmq {queue_url}: {m}")))
    }
}

#[async_trait]
impl BacklogCollector for RabbitMqCollector {
    async fn collect(&self) -> Result<MetricsSnapshot, CollectorError> {
        let mut total = 0u64;
        for queue_url in &self.queue_urls {
            total += self.queue_depth(queue_url).await?;
        }
        Ok(MetricsSnapshot::from_backlog(total))
    }
}

/// The `messages` count from a management-API queue resource.
fn message_count(body: &serde_json::Value) -> Result<u64, String> {
    body.get("messages")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| "queue resource has no numeric `messages` field".to_string())
}
