use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::transport::ConsumerTransport;
use rdkafka::consumer::{
    CommitMode, Consumer as RdkafkaConsumer, StreamConsumer as RdkafkaStreamConsumer,
};
use rdkafka::message::{BorrowedMessage as RdkafkaBorrowedMessage, Message as RdkafkaMessage};
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

/// rdkafka stream consumer with auto-commit disabled.
pub struct KafkaConsumer {
    consumer: RdkafkaStreamConsumer,
    group_id: String,
}

impl KafkaConsumer {
    /// Create a consumer. It does not join any topic until [`ConsumerTransport::subscribe`].
    pub fn new(config: &ConsumerConfig) -> Result<Self> {
        config.validate()?;
        let consumer: RdkafkaStreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| Error::Connection(format!("Failed to create consumer: {e}")))?;

        tracing::info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            "Kafka consumer created"
        );
        Ok(Self {
            consumer,
            group_id: config.group_id.clone(),
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Get the underlying consumer (for advanced use cases)
    pub fn inner(&self) -> &RdkafkaStreamConsumer {
        &self.consumer
    }
}

fn detach(msg: &RdkafkaBorrowedMessage<'_>) -> Message {
    Message {
        topic: msg.topic().to_string(),
        key: msg.key().map(|k| k.to_vec()),
        payload: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
        partition: msg.partition(),
        offset: msg.offset(),
        timestamp: msg.timestamp().to_millis(),
    }
}

#[async_trait::async_trait]
impl ConsumerTransport for KafkaConsumer {
    fn subscribe(&self, topic: &str) -> Result<()> {
        self.consumer
            .subscribe(&[topic])
            .map_err(|e| Error::Subscription {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Message>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(msg)) => Ok(Some(detach(&msg))),
            Ok(Err(e)) => Err(Error::Read(e.to_string())),
            // Nothing arrived within the poll interval
            Err(_) => Ok(None),
        }
    }

    fn commit(&self, message: &Message) -> Result<()> {
        let commit_error = |e: rdkafka::error::KafkaError| Error::Commit {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            message: e.to_string(),
        };

        // Kafka stores the position of the next message to read
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(commit_error)?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(commit_error)
    }
}
