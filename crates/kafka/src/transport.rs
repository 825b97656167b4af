//! Seams between the streaming logic and the broker client.
//!
//! The rdkafka-backed implementations live in [`crate::producer`],
//! [`crate::consumer`] and [`crate::admin`]; [`crate::testing`] provides
//! in-memory ones.

use crate::error::Result;
use crate::message::{DeliveryResult, Message, OutboundRecord};
use std::time::Duration;
use tokio::sync::oneshot;

/// Accepts records for asynchronous delivery.
pub trait ProducerTransport: Send + Sync {
    /// Queue `record` for delivery.
    ///
    /// Returns once the record is queued. The broker's verdict arrives later on
    /// `ack`; an error here means the record was never queued and `ack` is dropped.
    fn enqueue(&self, record: OutboundRecord, ack: oneshot::Sender<DeliveryResult>) -> Result<()>;
}

/// A consumer group member with manual offset management.
#[async_trait::async_trait]
pub trait ConsumerTransport: Send + Sync + 'static {
    /// Join the group for `topic`.
    fn subscribe(&self, topic: &str) -> Result<()>;

    /// Wait up to `timeout` for the next message. `Ok(None)` means nothing arrived.
    async fn poll(&self, timeout: Duration) -> Result<Option<Message>>;

    /// Persist `message` as processed for its partition.
    fn commit(&self, message: &Message) -> Result<()>;
}

/// Topic parameters used when provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
        }
    }
}

/// Result of a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOutcome {
    Created,
    AlreadyExists,
}

/// Topic administration.
#[async_trait::async_trait]
pub trait TopicAdmin: Send + Sync {
    async fn topic_exists(&self, name: &str) -> Result<bool>;

    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicOutcome>;
}
