//! Messaging core of a CRUD service template.
//!
//! Events are Avro-encoded against schemas held in a Confluent-compatible
//! schema registry and carried over Kafka. The building blocks live in their
//! own crates:
//!
//! - `stream_retry` - exponential backoff around fallible async operations
//! - `stream_schema_registry` - registry client, Avro serializer and deserializer
//! - `stream_kafka` - publisher, manual-commit subscriber, topic provisioning
//!
//! # CLI Usage
//!
//! ```bash
//! # Make sure the topic exists
//! stream-template create-topic --topic companies --partitions 3
//!
//! # Register the company schema under "companies-value"
//! stream-template register-schema --topic companies
//!
//! # Publish one event with the registered schema id
//! stream-template publish --topic companies --schema-id 1 --id 1 --name Acme --city Utrecht
//!
//! # Print and commit events until Ctrl-C
//! stream-template consume --topic companies
//! ```

pub mod config;
pub mod events;

pub use config::ProvisioningOpts;
pub use events::{company_schema_source, CompanyMessage, COMPANY_SCHEMA};
