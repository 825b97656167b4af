//! The registry operations the client needs, independent of transport.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Identifies one registered version of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    pub subject: String,
    pub id: u32,
    pub version: u32,
}

/// A schema version together with its definition text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSchema {
    pub subject: String,
    pub id: u32,
    pub version: u32,
    pub schema: String,
}

impl RegisteredSchema {
    pub fn schema_ref(&self) -> SchemaRef {
        SchemaRef {
            subject: self.subject.clone(),
            id: self.id,
            version: self.version,
        }
    }
}

/// Subject name for a topic's value schema (`TopicNameStrategy`).
pub fn value_subject(topic: &str) -> String {
    format!("{topic}-value")
}

/// Low-level schema registry operations.
///
/// Implementations perform a single request per call; retries and caching are
/// layered on top by [`crate::SchemaRegistryClient`].
#[async_trait::async_trait]
pub trait RegistryApi: Send + Sync {
    /// Verify that the registry is reachable.
    async fn check_connection(&self) -> Result<()>;

    /// Register `schema` under `subject`, returning its global id.
    ///
    /// Registering a schema identical to an existing version returns the
    /// existing id.
    async fn register(&self, subject: &str, schema: &str, normalize: bool) -> Result<u32>;

    /// Fetch a schema definition by its global id.
    async fn schema_by_id(&self, id: u32) -> Result<String>;

    /// Fetch the newest version registered under `subject`.
    async fn latest_version(&self, subject: &str) -> Result<RegisteredSchema>;
}
