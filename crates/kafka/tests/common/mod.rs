#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use stream_kafka::testing::MemoryBroker;
use stream_kafka::{ConsumerMessage, Publisher};
use stream_retry::RetryPolicy;
use stream_schema_registry::{MemoryRegistry, SchemaRegistryClient};

pub const COMPANY_SCHEMA: &str = r#"{
  "type": "record",
  "name": "CompanyMessage",
  "namespace": "template.events",
  "fields": [
    {"name": "id", "type": "string"},
    {"name": "name", "type": "string"},
    {"name": "city", "type": "string"}
  ]
}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub city: String,
}

impl ConsumerMessage for Company {
    fn event_name(&self) -> &str {
        "CompanyMessage"
    }
}

pub fn company(id: &str) -> Company {
    Company {
        id: id.to_string(),
        name: format!("company-{id}"),
        city: "Utrecht".to_string(),
    }
}

pub struct Fixture {
    pub broker: Arc<MemoryBroker>,
    pub registry: SchemaRegistryClient,
    pub schema_id: u32,
}

/// Broker with `topic` created and the company schema registered for it.
pub async fn fixture(topic: &str) -> Fixture {
    let broker = MemoryBroker::new();
    broker.add_topic(topic);
    let registry = SchemaRegistryClient::with_api(
        Arc::new(MemoryRegistry::new()),
        RetryPolicy::new(1, Duration::from_millis(1)),
    );
    let schema_id = registry
        .register_schema(topic, COMPANY_SCHEMA)
        .await
        .unwrap();
    Fixture {
        broker,
        registry,
        schema_id,
    }
}

impl Fixture {
    pub async fn publisher(&self, topic: &str) -> Publisher<MemoryBroker> {
        Publisher::with_schema_id(self.broker.clone(), &self.registry, topic, self.schema_id)
            .await
            .unwrap()
    }

    pub async fn publish_companies(&self, topic: &str, count: usize) {
        let publisher = self.publisher(topic).await;
        for i in 0..count {
            publisher.send(&company(&i.to_string())).await.unwrap();
        }
    }
}
