//! Message types shared by the publisher, the subscriber and the transports.

use serde::de::DeserializeOwned;

/// A message as read from the broker, payload still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Kafka topic name
    pub topic: String,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Schema-framed Avro bytes; empty when the broker message had no value
    pub payload: Vec<u8>,
    /// Kafka partition number
    pub partition: i32,
    /// Kafka offset within the partition
    pub offset: i64,
    /// Message timestamp in milliseconds since epoch (if available)
    pub timestamp: Option<i64>,
}

/// A serialized record on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Where the broker stored a published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Outcome of a single delivery as reported by the broker client.
pub type DeliveryResult = std::result::Result<DeliveryReport, String>;

/// An event type a [`crate::Subscriber`] can decode messages into.
///
/// ```rust
/// use serde::Deserialize;
/// use stream_kafka::ConsumerMessage;
///
/// #[derive(Debug, Deserialize)]
/// struct CompanyMessage {
///     id: String,
///     name: String,
///     city: String,
/// }
///
/// impl ConsumerMessage for CompanyMessage {
///     fn event_name(&self) -> &str {
///         "CompanyMessage"
///     }
/// }
/// ```
pub trait ConsumerMessage: DeserializeOwned + Send + 'static {
    /// Name tag identifying the kind of event
    fn event_name(&self) -> &str;
}

/// A decoded event handed to the caller, with the position it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered<M> {
    pub event: M,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
}

impl<M> Delivered<M> {
    pub fn into_event(self) -> M {
        self.event
    }
}
