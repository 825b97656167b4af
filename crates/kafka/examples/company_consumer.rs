use serde::Deserialize;
use std::sync::Arc;
use stream_kafka::{CancellationToken, ConsumerConfig, ConsumerMessage, KafkaConsumer, Subscriber};
use stream_schema_registry::{SchemaRegistryClient, SchemaRegistryConfig};

/// Example running several subscribers in one consumer group
///
/// Each subscriber owns a consumer, so the group spreads the topic's partitions
/// across them. Every event is printed and then committed.
///
/// To run this example:
/// 1. Start Kafka and a schema registry, e.g. with the Confluent images
/// 2. Create the topic and register the company schema
///   cargo run -- create-topic --topic companies --partitions 3
///   cargo run -- register-schema --topic companies
/// 3. Run the example
///   cargo run -p stream-kafka --example company_consumer

#[derive(Debug, Deserialize)]
struct CompanyMessage {
    id: String,
    name: String,
    city: String,
}

impl ConsumerMessage for CompanyMessage {
    fn event_name(&self) -> &str {
        "CompanyMessage"
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run_main().await {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let topic = "companies";
    let registry = SchemaRegistryClient::connect(&SchemaRegistryConfig::default()).await?;
    let config = ConsumerConfig::default().with_group_id("company-example-group");
    let cancel = CancellationToken::new();

    println!("Spawning 3 subscribers in the same consumer group...");
    let mut handles = Vec::new();
    for i in 0..3 {
        let consumer = Arc::new(KafkaConsumer::new(&config)?);
        let subscriber = Subscriber::with_registry(consumer, &registry, topic)
            .await?
            .with_poll_interval(config.poll_interval());
        subscriber.subscribe_to_topic()?;
        let mut subscription = subscriber.consume_messages::<CompanyMessage>(cancel.clone());

        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(delivered) = subscription.messages.recv() => {
                        let company = &delivered.event;
                        println!(
                            "[Subscriber {i}, partition {}] {} {}: {} in {}",
                            delivered.partition,
                            company.event_name(),
                            company.id,
                            company.name,
                            company.city
                        );
                        if subscription.commit(true).await.is_err() {
                            break;
                        }
                    }
                    Some(err) = subscription.errors.recv() => eprintln!("Subscriber {i}: {err}"),
                    else => break,
                }
            }
            subscription.stopped().await;
        }));
    }

    println!("Subscribers running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    cancel.cancel();

    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(()) => println!("Subscriber {i} stopped"),
            Err(e) => eprintln!("Subscriber {i} task error: {e}"),
        }
    }
    registry.close();

    Ok(())
}
