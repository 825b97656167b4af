//! Kafka client layer for Avro-encoded events.
//!
//! Features:
//!
//! - Publisher: serialize against a registered schema, publish, and wait for the broker's acknowledgment
//! - Subscriber: background consume loop with caller-driven, per-message offset commits
//! - Topic provisioning: create-if-missing with retries, for startup
//! - Transport seams: rdkafka-backed implementations plus an in-memory broker for tests

/// Provisioning topics at startup
pub mod admin;
pub mod config;

/// rdkafka stream consumer with manual offsets
pub mod consumer;
pub mod error;
pub mod message;

/// rdkafka producer with per-record acknowledgment channels
pub mod producer;
pub mod publisher;

/// Deliver-then-await-commit consume protocol
pub mod subscriber;
pub mod testing;
pub mod transport;

pub use admin::{create_topic_if_not_exists, KafkaAdmin};
pub use config::{ConsumerConfig, ProducerConfig};
pub use consumer::KafkaConsumer;
pub use error::{Error, Result};
pub use message::{
    ConsumerMessage, Delivered, DeliveryReport, DeliveryResult, Message, OutboundRecord,
};
pub use producer::KafkaProducer;
pub use publisher::Publisher;
pub use subscriber::{Inbox, Subscriber, SubscriberState, Subscription, DEFAULT_POLL_INTERVAL};
pub use transport::{ConsumerTransport, ProducerTransport, TopicAdmin, TopicOutcome, TopicSpec};

pub use tokio_util::sync::CancellationToken;
