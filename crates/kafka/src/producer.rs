use crate::config::ProducerConfig;
use crate::error::{Error, Result};
use crate::message::{DeliveryReport, DeliveryResult, OutboundRecord};
use crate::transport::ProducerTransport;
use rdkafka::client::ClientContext;
use rdkafka::message::{DeliveryResult as RdkafkaDeliveryResult, Message as RdkafkaMessage};
use rdkafka::producer::{BaseRecord, Producer, ProducerContext, ThreadedProducer};
use std::time::Duration;
use tokio::sync::oneshot;

type AckSender = Box<oneshot::Sender<DeliveryResult>>;

/// Routes each delivery report to the one-shot channel queued with its record.
pub struct AckContext;

impl ClientContext for AckContext {}

impl ProducerContext for AckContext {
    type DeliveryOpaque = AckSender;

    fn delivery(&self, delivery_result: &RdkafkaDeliveryResult<'_>, ack: Self::DeliveryOpaque) {
        let outcome = match delivery_result {
            Ok(message) => Ok(DeliveryReport {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            }),
            Err((err, message)) => Err(format!("{err} (partition {})", message.partition())),
        };
        // Receiver is gone if the caller stopped waiting; nothing left to notify
        let _ = ack.send(outcome);
    }
}

/// rdkafka producer whose background thread reports deliveries through [`AckContext`].
pub struct KafkaProducer {
    producer: ThreadedProducer<AckContext>,
}

impl KafkaProducer {
    pub fn new(config: &ProducerConfig) -> Result<Self> {
        let producer: ThreadedProducer<AckContext> = config
            .client_config()
            .create_with_context(AckContext)
            .map_err(|e| Error::Connection(format!("Failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %config.brokers,
            client_id = %config.client_id,
            "Kafka producer created"
        );
        Ok(Self { producer })
    }

    /// Wait for all queued records to be delivered or fail.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}

impl ProducerTransport for KafkaProducer {
    fn enqueue(&self, record: OutboundRecord, ack: oneshot::Sender<DeliveryResult>) -> Result<()> {
        let mut base: BaseRecord<'_, [u8], [u8], AckSender> =
            BaseRecord::with_opaque_to(&record.topic, Box::new(ack))
                .payload(record.payload.as_slice());
        if let Some(key) = record.key.as_deref() {
            base = base.key(key);
        }

        self.producer.send(base).map_err(|(err, _)| Error::Delivery {
            topic: record.topic.clone(),
            message: format!("Failed to enqueue record: {err}"),
        })
    }
}
