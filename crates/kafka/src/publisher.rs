use crate::error::{Error, Result};
use crate::message::{DeliveryReport, OutboundRecord};
use crate::producer::KafkaProducer;
use crate::transport::ProducerTransport;
use serde::Serialize;
use std::sync::Arc;
use stream_schema_registry::{AvroSerializer, SchemaRegistryClient, SerializerConfig};
use tokio::sync::oneshot;
use tracing::debug;

/// Publishes Avro-encoded values to one topic and waits for the broker's acknowledgment.
///
/// Each [`send`](Publisher::send) owns its own acknowledgment channel, so a
/// publisher can be shared between tasks. Failed deliveries are not retried:
/// whether a resend is safe depends on the payload, which only the caller knows.
pub struct Publisher<P = KafkaProducer> {
    transport: Arc<P>,
    serializer: AvroSerializer,
}

impl<P: ProducerTransport> Publisher<P> {
    /// The topic is the one the serializer was built for.
    pub fn new(transport: Arc<P>, serializer: AvroSerializer) -> Self {
        Self {
            transport,
            serializer,
        }
    }

    /// Build a publisher pinned to an already registered schema id.
    pub async fn with_schema_id(
        transport: Arc<P>,
        registry: &SchemaRegistryClient,
        topic: &str,
        schema_id: u32,
    ) -> Result<Self> {
        let serializer = registry
            .build_serializer(topic, &SerializerConfig::for_schema_id(schema_id))
            .await?;
        Ok(Self::new(transport, serializer))
    }

    pub fn topic(&self) -> &str {
        self.serializer.topic()
    }

    pub fn schema_id(&self) -> u32 {
        self.serializer.schema_id()
    }

    /// Serialize `value` and publish it, returning once the broker has acknowledged it.
    pub async fn send<T>(&self, value: &T) -> Result<DeliveryReport>
    where
        T: Serialize + ?Sized,
    {
        self.publish(None, value).await
    }

    /// Like [`send`](Publisher::send), with a message key for partitioning.
    pub async fn send_keyed<T>(&self, key: &[u8], value: &T) -> Result<DeliveryReport>
    where
        T: Serialize + ?Sized,
    {
        self.publish(Some(key.to_vec()), value).await
    }

    async fn publish<T>(&self, key: Option<Vec<u8>>, value: &T) -> Result<DeliveryReport>
    where
        T: Serialize + ?Sized,
    {
        let topic = self.topic().to_string();
        let payload = self
            .serializer
            .serialize(value)
            .map_err(|source| Error::Serialization {
                topic: topic.clone(),
                source,
            })?;

        let (ack_tx, ack_rx) = oneshot::channel();
        self.transport.enqueue(
            OutboundRecord {
                topic: topic.clone(),
                key,
                payload,
            },
            ack_tx,
        )?;

        let report = ack_rx
            .await
            .map_err(|_| Error::Delivery {
                topic: topic.clone(),
                message: "producer dropped the acknowledgment".to_string(),
            })?
            .map_err(|message| Error::Delivery {
                topic: topic.clone(),
                message,
            })?;

        debug!(
            topic = %report.topic,
            partition = report.partition,
            offset = report.offset,
            "Delivered message"
        );
        Ok(report)
    }
}
