mod common;

use common::{company, fixture, Company, COMPANY_SCHEMA};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use stream_kafka::{Error, Publisher};
use stream_retry::RetryPolicy;
use stream_schema_registry::{MemoryRegistry, SchemaRegistryClient};

#[derive(Serialize)]
struct Unrelated {
    temperature: f64,
}

#[tokio::test]
async fn test_send_waits_for_acknowledgment() {
    let fx = fixture("t1").await;
    let publisher = fx.publisher("t1").await;

    let report = publisher.send(&company("1")).await.unwrap();
    assert_eq!(report.topic, "t1");
    assert_eq!(report.offset, 0);

    let stored = fx.broker.messages("t1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].payload[0], 0);
    assert_eq!(&stored[0].payload[1..5], &fx.schema_id.to_be_bytes());
}

#[tokio::test]
async fn test_send_with_pinned_schema_id_five() {
    let registry = Arc::new(MemoryRegistry::new());
    for i in 0..4 {
        let fixed = format!(r#"{{"type": "fixed", "name": "f{i}", "size": {}}}"#, i + 1);
        registry.insert("other-value", &fixed);
    }
    let schema_id = registry.insert("t1-value", COMPANY_SCHEMA);
    assert_eq!(schema_id, 5);

    let fx = fixture("t1").await;
    let policy = RetryPolicy::new(1, Duration::from_millis(1));
    let client = SchemaRegistryClient::with_api(registry, policy);
    let publisher = Publisher::with_schema_id(fx.broker.clone(), &client, "t1", 5)
        .await
        .unwrap();
    assert_eq!(publisher.schema_id(), 5);

    publisher
        .send(&Company {
            id: "1".to_string(),
            name: "a".to_string(),
            city: String::new(),
        })
        .await
        .unwrap();

    let stored = fx.broker.messages("t1");
    assert_eq!(stored.len(), 1);
    assert_eq!(&stored[0].payload[..5], &[0, 0, 0, 0, 5]);
}

#[tokio::test]
async fn test_incompatible_value_is_not_published() {
    let fx = fixture("t1").await;
    let publisher = fx.publisher("t1").await;

    let err = publisher
        .send(&Unrelated { temperature: 21.5 })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Serialization { .. }));
    assert!(fx.broker.messages("t1").is_empty());
}

#[tokio::test]
async fn test_delivery_failure_is_surfaced() {
    let fx = fixture("t1").await;
    // Serializer is bound to a topic the broker does not have
    let publisher = fx.publisher("missing").await;

    let err = publisher.send(&company("1")).await.unwrap_err();
    match err {
        Error::Delivery { topic, message } => {
            assert_eq!(topic, "missing");
            assert!(message.contains("Unknown topic"));
        }
        other => panic!("expected delivery error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_keyed_send_stores_key() {
    let fx = fixture("t1").await;
    let publisher = fx.publisher("t1").await;

    publisher
        .send_keyed(b"company-7", &company("7"))
        .await
        .unwrap();
    let stored = fx.broker.messages("t1");
    assert_eq!(stored[0].key.as_deref(), Some(&b"company-7"[..]));
}

#[tokio::test]
async fn test_concurrent_senders_get_their_own_acknowledgments() {
    let fx = fixture("t1").await;
    let publisher = Arc::new(fx.publisher("t1").await);

    let mut handles = Vec::new();
    for i in 0..10 {
        let publisher = Arc::clone(&publisher);
        handles.push(tokio::spawn(async move {
            publisher.send(&company(&i.to_string())).await
        }));
    }

    let mut offsets = Vec::new();
    for handle in handles {
        offsets.push(handle.await.unwrap().unwrap().offset);
    }
    offsets.sort();
    assert_eq!(offsets, (0..10).collect::<Vec<i64>>());
    assert_eq!(fx.broker.messages("t1").len(), 10);
}
