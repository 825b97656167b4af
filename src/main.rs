//! Command-line interface for stream-template
//!
//! # Usage Examples
//!
//! ```bash
//! # Provision a topic, retrying until the broker is reachable
//! stream-template create-topic --topic companies --partitions 3 --replication-factor 1
//!
//! # Register a schema from a file instead of the embedded company schema
//! stream-template register-schema --topic companies --schema-file schemas/company.avsc
//!
//! # Publish and consume
//! stream-template publish --topic companies --schema-id 1 --id 42 --name Acme --city Utrecht
//! stream-template consume --topic companies --max-messages 10
//! ```
//!
//! Broker and registry settings come from flags or the usual environment
//! variables (`KAFKA_BROKERS`, `KAFKA_SCHEMA_REGISTRY_URL`, ...).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stream_kafka::{
    create_topic_if_not_exists, CancellationToken, ConsumerConfig, ConsumerMessage, KafkaAdmin,
    KafkaConsumer, KafkaProducer, ProducerConfig, Publisher, Subscriber, TopicOutcome, TopicSpec,
};
use stream_schema_registry::{SchemaRegistryClient, SchemaRegistryConfig, SchemaSource};
use stream_template::{company_schema_source, CompanyMessage, ProvisioningOpts};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "stream-template")]
#[command(about = "Publish and consume Avro events over Kafka")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a topic unless it already exists
    CreateTopic {
        /// Topic name
        #[arg(long)]
        topic: String,

        /// Number of partitions
        #[arg(long, default_value_t = 1)]
        partitions: i32,

        /// Replication factor
        #[arg(long, default_value_t = 1)]
        replication_factor: i32,

        #[command(flatten)]
        kafka: ProducerConfig,

        #[command(flatten)]
        provisioning: ProvisioningOpts,
    },

    /// Register a value schema for a topic
    RegisterSchema {
        /// Topic name; the schema goes under subject "<topic>-value"
        #[arg(long)]
        topic: String,

        /// Avro schema file (default: the embedded company schema)
        #[arg(long, value_name = "PATH")]
        schema_file: Option<PathBuf>,

        #[command(flatten)]
        registry: SchemaRegistryConfig,
    },

    /// Show the latest value schema registered for a topic
    LatestSchema {
        /// Topic name
        #[arg(long)]
        topic: String,

        #[command(flatten)]
        registry: SchemaRegistryConfig,
    },

    /// Publish one company event and wait for the broker's acknowledgment
    Publish {
        /// Topic name
        #[arg(long)]
        topic: String,

        /// Registered schema id to encode with
        #[arg(long)]
        schema_id: u32,

        /// Company id, also used as the message key
        #[arg(long)]
        id: String,

        /// Company name
        #[arg(long)]
        name: String,

        /// Company city
        #[arg(long, default_value = "")]
        city: String,

        #[command(flatten)]
        kafka: ProducerConfig,

        #[command(flatten)]
        registry: SchemaRegistryConfig,
    },

    /// Print company events, committing each one after it is printed
    Consume {
        /// Topic name
        #[arg(long)]
        topic: String,

        /// Stop after this many events (default: run until Ctrl-C)
        #[arg(long)]
        max_messages: Option<usize>,

        #[command(flatten)]
        kafka: ConsumerConfig,

        #[command(flatten)]
        registry: SchemaRegistryConfig,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CreateTopic {
            topic,
            partitions,
            replication_factor,
            kafka,
            provisioning,
        } => {
            let admin = KafkaAdmin::new(&kafka).context("Failed to create Kafka admin client")?;
            let spec = TopicSpec::new(topic, partitions, replication_factor);
            let outcome = create_topic_if_not_exists(&admin, &spec, &provisioning.retry_policy())
                .await
                .with_context(|| format!("Failed to provision topic '{}'", spec.name))?;
            match outcome {
                TopicOutcome::Created => println!("Topic '{}' created", spec.name),
                TopicOutcome::AlreadyExists => println!("Topic '{}' already exists", spec.name),
            }
        }
        Commands::RegisterSchema {
            topic,
            schema_file,
            registry,
        } => {
            let client = connect_registry(&registry).await?;
            let source = match schema_file {
                Some(path) => SchemaSource::File(path),
                None => company_schema_source(),
            };
            let id = client
                .load_schema_from_source(&topic, &source)
                .await
                .with_context(|| format!("Failed to register schema '{}'", source.name()))?;
            println!(
                "Registered schema '{}' for topic '{topic}' with id {id}",
                source.name()
            );
            client.close();
        }
        Commands::LatestSchema { topic, registry } => {
            let client = connect_registry(&registry).await?;
            let latest = client
                .lookup_latest(&topic)
                .await
                .with_context(|| format!("Failed to look up the latest schema for '{topic}'"))?;
            println!(
                "Subject '{}': version {}, id {}",
                latest.subject, latest.version, latest.id
            );
            client.close();
        }
        Commands::Publish {
            topic,
            schema_id,
            id,
            name,
            city,
            kafka,
            registry,
        } => {
            let client = connect_registry(&registry).await?;
            let producer =
                Arc::new(KafkaProducer::new(&kafka).context("Failed to create Kafka producer")?);
            let publisher = Publisher::with_schema_id(producer.clone(), &client, &topic, schema_id)
                .await
                .with_context(|| format!("Failed to build a publisher for schema id {schema_id}"))?;

            let event = CompanyMessage { id, name, city };
            let report = publisher
                .send_keyed(event.id.as_bytes(), &event)
                .await
                .with_context(|| format!("Failed to publish to '{topic}'"))?;
            println!(
                "Published to '{}' partition {} offset {}",
                report.topic, report.partition, report.offset
            );

            producer.flush(Duration::from_secs(10))?;
            client.close();
        }
        Commands::Consume {
            topic,
            max_messages,
            kafka,
            registry,
        } => {
            let client = connect_registry(&registry).await?;
            consume(&client, &topic, &kafka, max_messages).await?;
            client.close();
        }
    }

    Ok(())
}

async fn connect_registry(config: &SchemaRegistryConfig) -> anyhow::Result<SchemaRegistryClient> {
    SchemaRegistryClient::connect(config)
        .await
        .with_context(|| format!("Failed to connect to schema registry at {}", config.url))
}

async fn consume(
    registry: &SchemaRegistryClient,
    topic: &str,
    config: &ConsumerConfig,
    max_messages: Option<usize>,
) -> anyhow::Result<()> {
    let consumer = Arc::new(KafkaConsumer::new(config).context("Failed to create Kafka consumer")?);
    let subscriber = Subscriber::with_registry(consumer, registry, topic)
        .await?
        .with_poll_interval(config.poll_interval());
    subscriber
        .subscribe_to_topic()
        .with_context(|| format!("Failed to subscribe to '{topic}'"))?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                cancel.cancel();
            }
        }
    });

    let mut subscription = subscriber.consume_messages::<CompanyMessage>(cancel.clone());
    let mut processed = 0usize;
    loop {
        tokio::select! {
            delivered = subscription.messages.recv() => {
                let Some(delivered) = delivered else { break };
                let company = &delivered.event;
                println!(
                    "[partition {} offset {}] {} {}: {} ({})",
                    delivered.partition,
                    delivered.offset,
                    company.event_name(),
                    company.id,
                    company.name,
                    company.city
                );
                if subscription.commit(true).await.is_err() {
                    break;
                }
                processed += 1;
                if max_messages.is_some_and(|max| processed >= max) {
                    break;
                }
            }
            Some(err) = subscription.errors.recv() => warn!("{err}"),
        }
    }

    cancel.cancel();
    subscription.stopped().await;
    info!(topic, processed, "Consumer stopped");
    Ok(())
}
