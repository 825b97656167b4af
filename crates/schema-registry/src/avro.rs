//! Avro serializer and deserializer using the Confluent wire format.
//!
//! A framed payload is laid out as:
//!
//! ```text
//! +-------+----------------------+------------------------+
//! | 0x00  | schema id (u32, BE)  | Avro binary datum ...  |
//! +-------+----------------------+------------------------+
//! ```

use crate::cache::SchemaCache;
use crate::error::{Error, Result};
use apache_avro::Schema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

const MAGIC_BYTE: u8 = 0;
const HEADER_LEN: usize = 5;

/// How a serializer picks the schema it writes with.
///
/// Resolution order: `use_schema_id`, then `use_latest_version`, then
/// `auto_register_schemas` (which requires `schema`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Register `schema` under the topic's subject when building the serializer
    pub auto_register_schemas: bool,
    /// Write with this registered schema id
    pub use_schema_id: Option<u32>,
    /// Write with the newest version registered for the topic
    pub use_latest_version: bool,
    /// Ask the registry to normalize the schema on registration
    pub normalize_schemas: bool,
    /// Schema definition used for auto-registration
    pub schema: Option<String>,
}

impl SerializerConfig {
    /// Pinned to a pre-registered schema id; nothing gets registered.
    pub fn for_schema_id(schema_id: u32) -> Self {
        Self {
            auto_register_schemas: false,
            use_schema_id: Some(schema_id),
            use_latest_version: true,
            normalize_schemas: true,
            schema: None,
        }
    }

    pub fn auto_register(schema: impl Into<String>) -> Self {
        Self {
            auto_register_schemas: true,
            schema: Some(schema.into()),
            ..Default::default()
        }
    }
}

/// How a deserializer picks its reader schema.
///
/// With neither option set, payloads are decoded with the writer schema named
/// in their header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeserializerConfig {
    /// Resolve payloads into this registered schema id
    pub use_schema_id: Option<u32>,
    /// Resolve payloads into the newest version registered for the topic
    pub use_latest_version: bool,
}

/// Prefix an Avro datum with the magic byte and schema id.
pub fn frame(schema_id: u32, datum: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(HEADER_LEN + datum.len());
    payload.push(MAGIC_BYTE);
    payload.extend_from_slice(&schema_id.to_be_bytes());
    payload.extend_from_slice(datum);
    payload
}

/// Split a framed payload into its schema id and Avro datum.
pub fn unframe(payload: &[u8]) -> Result<(u32, &[u8])> {
    if payload.len() < HEADER_LEN {
        return Err(Error::Deserialization(format!(
            "payload of {} bytes is shorter than the {HEADER_LEN}-byte header",
            payload.len()
        )));
    }
    if payload[0] != MAGIC_BYTE {
        return Err(Error::Deserialization(format!(
            "unknown magic byte {:#04x}",
            payload[0]
        )));
    }
    let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    Ok((id, &payload[HEADER_LEN..]))
}

/// Encodes values with one registered schema.
#[derive(Debug, Clone)]
pub struct AvroSerializer {
    topic: String,
    schema_id: u32,
    schema: Arc<Schema>,
}

impl AvroSerializer {
    pub(crate) fn new(topic: &str, schema_id: u32, schema: Arc<Schema>) -> Self {
        Self {
            topic: topic.to_string(),
            schema_id,
            schema,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn schema_id(&self) -> u32 {
        self.schema_id
    }

    /// Encode `value` and frame it. Fails when the value does not fit the schema.
    pub fn serialize<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let value = apache_avro::to_value(value)
            .map_err(|e| Error::Serialization(format!("topic {}: {e}", self.topic)))?;
        let value = value.resolve(&self.schema).map_err(|e| {
            Error::Serialization(format!(
                "topic {}: value does not match schema {}: {e}",
                self.topic, self.schema_id
            ))
        })?;
        let datum = apache_avro::to_avro_datum(&self.schema, value)
            .map_err(|e| Error::Serialization(format!("topic {}: {e}", self.topic)))?;
        Ok(frame(self.schema_id, &datum))
    }
}

/// Decodes framed payloads, looking writer schemas up by the id in each header.
#[derive(Clone)]
pub struct AvroDeserializer {
    topic: String,
    cache: Arc<SchemaCache>,
    reader_schema: Option<Arc<Schema>>,
}

impl std::fmt::Debug for AvroDeserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvroDeserializer")
            .field("topic", &self.topic)
            .field("reader_schema", &self.reader_schema.is_some())
            .finish()
    }
}

impl AvroDeserializer {
    pub(crate) fn new(
        topic: &str,
        cache: Arc<SchemaCache>,
        reader_schema: Option<Arc<Schema>>,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            cache,
            reader_schema,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Decode a framed payload into `T`.
    ///
    /// The writer schema is fetched from the registry on first sight of its id
    /// and cached afterwards. Lookups here are single attempts.
    pub async fn deserialize<T>(&self, payload: &[u8]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let (schema_id, mut datum) = unframe(payload)?;
        let writer = self.cache.schema(schema_id).await.map_err(|e| {
            Error::Deserialization(format!("writer schema {schema_id} unavailable: {e}"))
        })?;
        let value =
            apache_avro::from_avro_datum(&writer, &mut datum, self.reader_schema.as_deref())
                .map_err(|e| {
                    Error::Deserialization(format!(
                        "topic {}: invalid datum for schema {schema_id}: {e}",
                        self.topic
                    ))
                })?;
        apache_avro::from_value::<T>(&value).map_err(|e| {
            Error::Deserialization(format!(
                "topic {}: cannot map schema {schema_id} record: {e}",
                self.topic
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let payload = frame(5, &[0xAA, 0xBB]);
        assert_eq!(payload, vec![0, 0, 0, 0, 5, 0xAA, 0xBB]);

        let (id, datum) = unframe(&payload).unwrap();
        assert_eq!(id, 5);
        assert_eq!(datum, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_unframe_rejects_short_payload() {
        assert!(matches!(
            unframe(&[0, 0, 1]),
            Err(Error::Deserialization(_))
        ));
        assert!(matches!(unframe(&[]), Err(Error::Deserialization(_))));
    }

    #[test]
    fn test_unframe_rejects_bad_magic() {
        let err = unframe(&[7, 0, 0, 0, 1, 2]).unwrap_err();
        assert!(err.to_string().contains("magic byte"));
    }

    #[test]
    fn test_schema_id_config_preset() {
        let config = SerializerConfig::for_schema_id(5);
        assert_eq!(config.use_schema_id, Some(5));
        assert!(!config.auto_register_schemas);
        assert!(config.normalize_schemas);
    }
}
