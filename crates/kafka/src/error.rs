use stream_retry::RetryExhausted;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Failed to create Kafka client: {0}")]
    Connection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to serialize message for topic '{topic}'")]
    Serialization {
        topic: String,
        #[source]
        source: stream_schema_registry::Error,
    },

    #[error("Delivery to topic '{topic}' failed: {message}")]
    Delivery { topic: String, message: String },

    #[error("Failed to subscribe to topic '{topic}': {message}")]
    Subscription { topic: String, message: String },

    #[error("Consumer read error: {0}")]
    Read(String),

    #[error("Failed to deserialize message at {topic}[{partition}]@{offset}")]
    Deserialization {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: stream_schema_registry::Error,
    },

    #[error("Offset commit error for {topic}[{partition}]@{offset}: {message}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        message: String,
    },

    #[error("Failed to create topic '{topic}': {message}")]
    TopicCreation { topic: String, message: String },

    #[error("Schema registry error: {0}")]
    Registry(#[from] stream_schema_registry::Error),

    #[error("{operation} failed")]
    Exhausted {
        operation: String,
        #[source]
        source: Box<RetryExhausted<Error>>,
    },

    #[error("Subscription has stopped")]
    SubscriptionClosed,
}

impl Error {
    pub(crate) fn exhausted(operation: impl Into<String>, source: RetryExhausted<Error>) -> Self {
        Error::Exhausted {
            operation: operation.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
