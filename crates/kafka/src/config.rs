//! Broker connection settings.
//!
//! Every field can be set by command-line flag or environment variable, and
//! falls back to the same defaults as [`Default`].

use crate::error::{Error, Result};
use clap::Args;
use rdkafka::config::ClientConfig;
use std::time::Duration;

/// Settings for [`crate::KafkaProducer`] and [`crate::KafkaAdmin`].
#[derive(Debug, Clone, Args)]
pub struct ProducerConfig {
    /// Kafka brokers, e.g. "localhost:9092,localhost:9093"
    #[arg(
        long = "kafka-brokers",
        env = "KAFKA_BROKERS",
        default_value = "localhost:9092"
    )]
    pub brokers: String,

    /// Logical application name sent with every request, for server-side request logging
    #[arg(
        long = "kafka-client-id",
        env = "KAFKA_CLIENT_ID",
        default_value = "default-client"
    )]
    pub client_id: String,

    /// How long the producer keeps trying to deliver a message before reporting failure
    #[arg(
        long = "kafka-message-timeout-ms",
        env = "KAFKA_PRODUCER_MESSAGE_TIMEOUT_MS",
        default_value_t = 5000
    )]
    pub message_timeout_ms: u64,
}

impl ProducerConfig {
    pub fn with_brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = brokers.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id)
            .set("message.timeout.ms", self.message_timeout_ms.to_string());
        config
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            client_id: "default-client".to_string(),
            message_timeout_ms: 5000,
        }
    }
}

/// Settings for [`crate::KafkaConsumer`].
#[derive(Debug, Clone, Args)]
pub struct ConsumerConfig {
    /// Kafka brokers, e.g. "localhost:9092,localhost:9093"
    #[arg(
        long = "kafka-brokers",
        env = "KAFKA_BROKERS",
        default_value = "localhost:9092"
    )]
    pub brokers: String,

    /// Consumer group ID
    #[arg(
        long = "group-id",
        env = "KAFKA_CONSUMER_GROUP_ID",
        default_value = "default-group"
    )]
    pub group_id: String,

    /// Where to start when the group has no committed offset ("earliest" or "latest")
    ///
    /// "earliest" avoids missing messages produced before the group first joined.
    #[arg(
        long = "auto-offset-reset",
        env = "KAFKA_CONSUMER_AUTO_OFFSET_RESET",
        default_value = "earliest"
    )]
    pub auto_offset_reset: String,

    /// Must stay false: offsets are only committed when the caller asks for it
    #[arg(
        long = "enable-auto-commit",
        env = "KAFKA_CONSUMER_ENABLE_AUTO_COMMIT",
        action = clap::ArgAction::Set,
        default_value_t = false
    )]
    pub enable_auto_commit: bool,

    /// Maximum time between polls before the consumer is considered failed
    #[arg(
        long = "max-poll-interval-ms",
        env = "KAFKA_CONSUMER_MAX_POLL_INTERVAL_MS",
        default_value_t = 300_000
    )]
    pub max_poll_interval_ms: u64,

    /// Session timeout in milliseconds
    #[arg(
        long = "session-timeout-ms",
        env = "KAFKA_CONSUMER_SESSION_TIMEOUT_MS",
        default_value_t = 45_000
    )]
    pub session_timeout_ms: u64,

    /// Group coordinator heartbeat interval
    #[arg(
        long = "heartbeat-interval-ms",
        env = "KAFKA_CONSUMER_HEARTBEAT_INTERVAL_MS",
        default_value_t = 3000
    )]
    pub heartbeat_interval_ms: u64,

    /// Backoff before retrying a failed broker request
    #[arg(
        long = "retry-backoff-ms",
        env = "KAFKA_CONSUMER_RETRY_BACKOFF_MS",
        default_value_t = 100
    )]
    pub retry_backoff_ms: u64,

    /// Minimum bytes the broker accumulates before answering a fetch
    #[arg(
        long = "fetch-min-bytes",
        env = "KAFKA_CONSUMER_FETCH_MIN_BYTES",
        default_value_t = 1
    )]
    pub fetch_min_bytes: u32,

    /// Maximum time the broker waits to fill `fetch-min-bytes`
    #[arg(
        long = "fetch-wait-max-ms",
        env = "KAFKA_CONSUMER_FETCH_WAIT_MAX_MS",
        default_value_t = 500
    )]
    pub fetch_wait_max_ms: u64,

    /// How long a single poll waits for a message before checking for cancellation
    #[arg(
        long = "poll-interval-ms",
        env = "KAFKA_CONSUMER_POLL_INTERVAL_MS",
        default_value_t = 100
    )]
    pub poll_interval_ms: u64,
}

impl ConsumerConfig {
    pub fn with_brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = brokers.into();
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn with_auto_offset_reset(mut self, auto_offset_reset: impl Into<String>) -> Self {
        self.auto_offset_reset = auto_offset_reset.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.enable_auto_commit {
            return Err(Error::InvalidConfig(
                "enable_auto_commit must be false; offsets are committed explicitly".to_string(),
            ));
        }
        if !matches!(self.auto_offset_reset.as_str(), "earliest" | "latest" | "none") {
            return Err(Error::InvalidConfig(format!(
                "auto_offset_reset must be earliest, latest or none, got '{}'",
                self.auto_offset_reset
            )));
        }
        if self.group_id.is_empty() {
            return Err(Error::InvalidConfig("group_id must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .set(
                "max.poll.interval.ms",
                self.max_poll_interval_ms.to_string(),
            )
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set(
                "heartbeat.interval.ms",
                self.heartbeat_interval_ms.to_string(),
            )
            .set("retry.backoff.ms", self.retry_backoff_ms.to_string())
            .set("fetch.min.bytes", self.fetch_min_bytes.to_string())
            .set("fetch.wait.max.ms", self.fetch_wait_max_ms.to_string())
            .set("enable.partition.eof", "false");
        config
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "default-group".to_string(),
            auto_offset_reset: "earliest".to_string(),
            enable_auto_commit: false,
            max_poll_interval_ms: 300_000,
            session_timeout_ms: 45_000,
            heartbeat_interval_ms: 3000,
            retry_backoff_ms: 100,
            fetch_min_bytes: 1,
            fetch_wait_max_ms: 500,
            poll_interval_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_client_config() {
        let config = ConsumerConfig::default()
            .with_brokers("kafka:9092")
            .with_group_id("companies");
        let client = config.client_config();
        assert_eq!(client.get("bootstrap.servers"), Some("kafka:9092"));
        assert_eq!(client.get("group.id"), Some("companies"));
        assert_eq!(client.get("enable.auto.commit"), Some("false"));
        assert_eq!(client.get("fetch.wait.max.ms"), Some("500"));
        assert_eq!(client.get("heartbeat.interval.ms"), Some("3000"));
    }

    #[test]
    fn test_auto_commit_is_rejected() {
        let config = ConsumerConfig {
            enable_auto_commit: true,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert!(ConsumerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_offset_reset_is_rejected() {
        let config = ConsumerConfig::default().with_auto_offset_reset("beginning");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_producer_client_config() {
        let config = ProducerConfig::default().with_client_id("publisher-1");
        let client = config.client_config();
        assert_eq!(client.get("client.id"), Some("publisher-1"));
        assert_eq!(client.get("message.timeout.ms"), Some("5000"));
    }
}
