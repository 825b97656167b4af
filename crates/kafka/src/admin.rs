use crate::config::ProducerConfig;
use crate::error::{Error, Result};
use crate::transport::{TopicAdmin, TopicOutcome, TopicSpec};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use std::sync::Arc;
use std::time::Duration;
use stream_retry::RetryPolicy;
use tracing::info;

/// Broker-side timeout for a create request.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for metadata lookups.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// rdkafka admin client.
pub struct KafkaAdmin {
    admin: Arc<AdminClient<DefaultClientContext>>,
}

impl KafkaAdmin {
    /// Create an admin client for the same brokers the producer uses.
    pub fn new(config: &ProducerConfig) -> Result<Self> {
        let admin: AdminClient<DefaultClientContext> = config
            .client_config()
            .create()
            .map_err(|e| Error::Connection(format!("Failed to create admin client: {e}")))?;
        Ok(Self {
            admin: Arc::new(admin),
        })
    }
}

#[async_trait::async_trait]
impl TopicAdmin for KafkaAdmin {
    async fn topic_exists(&self, name: &str) -> Result<bool> {
        let admin = Arc::clone(&self.admin);
        let topic = name.to_string();
        // Metadata requests block the calling thread
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let metadata = admin
                .inner()
                .fetch_metadata(Some(topic.as_str()), METADATA_TIMEOUT)?;
            Ok(metadata
                .topics()
                .iter()
                .any(|t| t.name() == topic && t.error().is_none() && !t.partitions().is_empty()))
        })
        .await
        .map_err(|e| Error::Read(format!("Metadata lookup task failed: {e}")))?
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicOutcome> {
        let new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        let opts = AdminOptions::new().operation_timeout(Some(OPERATION_TIMEOUT));

        let results = self
            .admin
            .create_topics(&[new_topic], &opts)
            .await
            .map_err(|e| Error::TopicCreation {
                topic: spec.name.clone(),
                message: e.to_string(),
            })?;

        let mut outcome = TopicOutcome::Created;
        for result in results {
            match result {
                Ok(_) => {}
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    outcome = TopicOutcome::AlreadyExists;
                }
                Err((topic, code)) => {
                    return Err(Error::TopicCreation {
                        topic,
                        message: code.to_string(),
                    })
                }
            }
        }
        Ok(outcome)
    }
}

/// Make sure `spec.name` exists, creating it if needed.
///
/// Both the existence check and the creation are retried per `policy`. An error
/// here means the topic could not be provisioned; callers treat it as fatal.
pub async fn create_topic_if_not_exists<A>(
    admin: &A,
    spec: &TopicSpec,
    policy: &RetryPolicy,
) -> Result<TopicOutcome>
where
    A: TopicAdmin + ?Sized,
{
    let outcome = policy
        .run("topic provisioning", || async {
            if admin.topic_exists(&spec.name).await? {
                return Ok(TopicOutcome::AlreadyExists);
            }
            admin.create_topic(spec).await
        })
        .await
        .map_err(|e| Error::exhausted(format!("Creating topic '{}'", spec.name), e))?;

    match outcome {
        TopicOutcome::Created => info!(
            topic = %spec.name,
            partitions = spec.partitions,
            replication_factor = spec.replication_factor,
            "Topic created"
        ),
        TopicOutcome::AlreadyExists => info!(topic = %spec.name, "Topic already exists"),
    }
    Ok(outcome)
}
