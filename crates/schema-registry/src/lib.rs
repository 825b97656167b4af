//! Schema registry client and Avro serde for the streaming layer.
//!
//! - [`SchemaRegistryClient`]: registers and looks up schemas, builds serializers
//!   and deserializers. All registry calls are retried with backoff.
//! - [`AvroSerializer`] / [`AvroDeserializer`]: Confluent wire format
//!   (magic byte, schema id, Avro binary datum).
//! - [`HttpRegistry`]: the REST transport. [`MemoryRegistry`]: an in-process
//!   stand-in for tests.

pub mod api;
pub mod avro;
mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod source;

pub use api::{value_subject, RegisteredSchema, RegistryApi, SchemaRef};
pub use avro::{AvroDeserializer, AvroSerializer, DeserializerConfig, SerializerConfig};
pub use client::SchemaRegistryClient;
pub use config::SchemaRegistryConfig;
pub use error::{Error, Result};
pub use http::HttpRegistry;
pub use memory::MemoryRegistry;
pub use source::SchemaSource;

pub use apache_avro::Schema;
