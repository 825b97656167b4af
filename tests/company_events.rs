use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use stream_kafka::testing::{MemoryBroker, MemoryConsumer};
use stream_kafka::{
    create_topic_if_not_exists, CancellationToken, ConsumerMessage, Publisher, Subscriber,
    TopicOutcome, TopicSpec,
};
use stream_retry::RetryPolicy;
use stream_schema_registry::{MemoryRegistry, SchemaRegistryClient, SchemaSource};
use stream_template::{company_schema_source, CompanyMessage, COMPANY_SCHEMA};

fn registry() -> SchemaRegistryClient {
    SchemaRegistryClient::with_api(
        Arc::new(MemoryRegistry::new()),
        RetryPolicy::new(1, Duration::from_millis(1)),
    )
}

#[tokio::test]
async fn test_embedded_schema_registers() {
    let registry = registry();
    let id = registry
        .load_schema_from_source("companies", &company_schema_source())
        .await
        .unwrap();

    let latest = registry.lookup_latest("companies").await.unwrap();
    assert_eq!(latest.subject, "companies-value");
    assert_eq!(latest.id, id);
}

#[tokio::test]
async fn test_schema_file_and_embedded_schema_share_an_id() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(COMPANY_SCHEMA.as_bytes()).unwrap();

    let registry = registry();
    let from_file = registry
        .load_schema_from_source("companies", &SchemaSource::File(file.path().to_path_buf()))
        .await
        .unwrap();
    let embedded = registry
        .load_schema_from_source("companies", &company_schema_source())
        .await
        .unwrap();
    assert_eq!(from_file, embedded);
}

#[tokio::test(start_paused = true)]
async fn test_company_event_end_to_end() {
    let broker = MemoryBroker::new();
    let outcome = create_topic_if_not_exists(
        broker.as_ref(),
        &TopicSpec::new("companies", 1, 1),
        &RetryPolicy::new(3, Duration::from_millis(10)),
    )
    .await
    .unwrap();
    assert_eq!(outcome, TopicOutcome::Created);

    let registry = registry();
    let schema_id = registry
        .load_schema_from_source("companies", &company_schema_source())
        .await
        .unwrap();

    let publisher = Publisher::with_schema_id(broker.clone(), &registry, "companies", schema_id)
        .await
        .unwrap();
    let sent = CompanyMessage {
        id: "42".to_string(),
        name: "Acme".to_string(),
        city: "Utrecht".to_string(),
    };
    publisher.send_keyed(b"42", &sent).await.unwrap();

    let consumer = Arc::new(MemoryConsumer::new(broker.clone(), "company-service"));
    let subscriber = Subscriber::with_registry(consumer, &registry, "companies")
        .await
        .unwrap();
    subscriber.subscribe_to_topic().unwrap();

    let cancel = CancellationToken::new();
    let mut subscription = subscriber.consume_messages::<CompanyMessage>(cancel.clone());
    let delivered = subscription.messages.recv().await.unwrap();
    assert_eq!(delivered.event.event_name(), "CompanyMessage");
    assert_eq!(delivered.key.as_deref(), Some(&b"42"[..]));
    assert_eq!(delivered.into_event(), sent);

    subscription.commit(true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        broker.last_committed("company-service", "companies"),
        Some(0)
    );

    cancel.cancel();
    subscription.stopped().await;
}
