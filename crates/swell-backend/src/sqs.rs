//! SQS backlog measurement.
//!
//! The backlog of an SQS queue is the sum of its visible and in-flight
//! message counts; a message being processed still needs a consumer
//! replica until it is deleted.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sqs::types::QueueAttributeName;

use crate::collector::{BacklogCollector, CollectorError};
use crate::snapshot::MetricsSnapshot;

/// Reads queue depths through the SQS API with static credentials from
/// the workload's configuration entry.
pub struct SqsCollector {
    client: aws_sdk_sqs::Client,
    queue_urls: Vec<String>,
}

impl SqsCollector {
    pub fn new(key: &str, secret: &str, region: &str, queue_urls: Vec<String>) -> Self {
        let credentials = Credentials::new(key, secret, None, None, "workload-config");
        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .build();
        Self {
            client: aws_sdk_sqs::Client::from_conf(config),
            queue_urls,
        }
    }

    async fn queue_depth(&self, queue_url: &str) -> Result<u64, CollectorError> {
        let out = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .send()
            .await
            .map_err(|e| CollectorError::Request(format!("sqs {queue_url}: {e}")))?;

        let attrs = out.attributes().ok_or_else(|| {
            CollectorError::MalformedResponse(format!("sqs {queue_url}: no attributes returned"))
        })?;
        visible_and_in_flight(attrs)
            .map_err(|m| CollectorError::MalformedResponse(format!("sqs {queue_url}: {m}")))
    }
}

#[async_trait]
impl BacklogCollector for SqsCollector {
    async fn collect(&self) -> Result<MetricsSnapshot, CollectorError> {
        let mut total = 0u64;
        for queue_url in &self.queue_urls {
            total += self.queue_depth(queue_url).await?;
        }
        Ok(MetricsSnapshot::from_backlog(total))
    }
}

/// Sum of the visible and in-flight counts in a queue's attributes.
fn visible_and_in_flight(
    attrs: &HashMap<QueueAttributeName, String>,
) -> Result<u64, String> {
    let count = |name: QueueAttributeName| -> Result<u64, String> {
        let raw = attrs
            .get(&name)
            .ok_or_else(|| format!("attribute {} missing", name.as_str()))?;
        raw.parse()
            .map_err(|_| format!("attribute {} is not a count: `{raw}`", name.as_str()))
    };
    Ok(count(QueueAttributeName::ApproximateNumberOfMessages)?
        + count(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(visible: &str, in_flight: &str) -> HashMap<QueueAttributeName, String> {
        HashMap::from([
            (
                QueueAttributeName::ApproximateNumberOfMessages,
                visible.to_string(),
            ),
            (
                QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
                in_flight.to_string(),
            ),
        ])
    }

    #[test]
    fn sums_visible_and_in_flight() {
        assert_eq!(visible_and_in_flight(&attrs("40", "2")).unwrap(), 42);
        assert_eq!(visible_and_in_flight(&attrs("0", "0")).unwrap(), 0);
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let mut a = attrs("40", "2");
        a.remove(&QueueAttributeName::ApproximateNumberOfMessagesNotVisible);
        assert!(visible_and_in_flight(&a).is_err());
    }

    #[test]
    fn non_numeric_attribute_is_an_error() {
        assert!(visible_and_in_flight(&attrs("many", "2")).is_err());
    }
}
