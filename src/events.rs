//! Example event exchanged with the company service.

use serde::{Deserialize, Serialize};
use stream_kafka::ConsumerMessage;
use stream_schema_registry::SchemaSource;

/// Avro schema of [`CompanyMessage`].
pub const COMPANY_SCHEMA: &str = include_str!("../schemas/company.avsc");

/// Schema source for registering [`COMPANY_SCHEMA`] without touching the filesystem.
pub fn company_schema_source() -> SchemaSource {
    SchemaSource::Embedded {
        name: "company.avsc",
        definition: COMPANY_SCHEMA,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMessage {
    pub id: String,
    pub name: String,
    pub city: String,
}

impl ConsumerMessage for CompanyMessage {
    fn event_name(&self) -> &str {
        "CompanyMessage"
    }
}
