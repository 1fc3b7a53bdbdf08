//! swell-backend — backlog measurement for the Swell autoscaler.
//!
//! A backend is a message broker that can report how many messages are
//! waiting for a workload. Each adapter implements [`BacklogCollector`]:
//! fetch the backlog for every configured queue/subscription, sum them,
//! and return a [`MetricsSnapshot`] carrying the total under the
//! well-known [`BACKLOG_METRIC`] key. A failure on any one identifier
//! fails the whole collection; there are no partial snapshots.
//!
//! Supported backends:
//! - [`sqs::SqsCollector`] — visible plus in-flight messages per queue URL
//! - [`pubsub::PubSubCollector`] — undelivered/outstanding message
//!   metrics from Cloud Monitoring per subscription
//! - [`rabbitmq::RabbitMqCollector`] — the management API's `messages`
//!   count per queue URL

pub mod collector;
pub mod pubsub;
pub mod rabbitmq;
pub mod snapshot;
pub mod sqs;

pub use collector::{BacklogCollector, CollectorError};
pub use snapshot::{BACKLOG_METRIC, MetricsSnapshot};
