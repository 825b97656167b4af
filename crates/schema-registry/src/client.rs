use crate::api::{value_subject, RegistryApi, SchemaRef};
use crate::avro::{AvroDeserializer, AvroSerializer, DeserializerConfig, SerializerConfig};
use crate::cache::{parse_schema, SchemaCache};
use crate::config::SchemaRegistryConfig;
use crate::error::{Error, Result};
use crate::http::HttpRegistry;
use crate::source::SchemaSource;
use apache_avro::Schema;
use std::sync::Arc;
use stream_retry::RetryPolicy;
use tracing::{debug, info};

/// Single point of contact with the schema registry.
///
/// Every registry call is wrapped in the client's [`RetryPolicy`]. Failures that
/// survive the retries are returned to the caller: the registry is a startup
/// dependency, so callers are expected to abort setup on error.
pub struct SchemaRegistryClient {
    cache: Arc<SchemaCache>,
    policy: RetryPolicy,
}

impl SchemaRegistryClient {
    /// Connect to the registry over HTTP, retrying until it answers.
    pub async fn connect(config: &SchemaRegistryConfig) -> Result<Self> {
        let policy = config.retry_policy();
        let api = HttpRegistry::new(&config.url, config.request_timeout())?;

        policy
            .run("schema registry connect", || api.check_connection())
            .await
            .map_err(|e| {
                Error::exhausted(
                    format!("Connecting to schema registry at {}", config.url),
                    e,
                )
            })?;

        info!(url = %config.url, "Connected to schema registry");
        Ok(Self::with_api(Arc::new(api), policy))
    }

    /// Build a client over any [`RegistryApi`] implementation.
    pub fn with_api(api: Arc<dyn RegistryApi>, policy: RetryPolicy) -> Self {
        Self {
            cache: Arc::new(SchemaCache::new(api)),
            policy,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn api(&self) -> &Arc<dyn RegistryApi> {
        self.cache.api()
    }

    /// Register a value schema for `topic` and return its id.
    ///
    /// Registration is idempotent: the registry hands back the existing id for
    /// a schema it has already seen under the subject.
    pub async fn register_schema(&self, topic: &str, schema: &str) -> Result<u32> {
        self.register(topic, schema, false).await
    }

    async fn register(&self, topic: &str, schema: &str, normalize: bool) -> Result<u32> {
        self.cache.ensure_open()?;
        // Invalid definitions cannot succeed on retry
        let parsed = parse_schema(schema)?;
        let subject = value_subject(topic);

        let id = self
            .policy
            .run("schema registration", || {
                self.api().register(&subject, schema, normalize)
            })
            .await
            .map_err(|e| {
                Error::exhausted(format!("Registering schema for subject '{subject}'"), e)
            })?;

        self.cache.insert(id, parsed);
        info!(subject = %subject, schema_id = id, "Registered schema");
        Ok(id)
    }

    /// Read a schema definition from `source`, then register it for `topic`.
    pub async fn load_schema_from_source(
        &self,
        topic: &str,
        source: &SchemaSource,
    ) -> Result<u32> {
        let definition = source.read().await?;
        debug!(source = %source.name(), topic, "Loaded schema definition");
        self.register_schema(topic, &definition).await
    }

    /// Newest schema version registered for `topic`.
    pub async fn lookup_latest(&self, topic: &str) -> Result<SchemaRef> {
        self.cache.ensure_open()?;
        let subject = value_subject(topic);
        let latest = self
            .policy
            .run("schema lookup", || self.api().latest_version(&subject))
            .await
            .map_err(|e| {
                Error::exhausted(format!("Looking up latest schema for '{subject}'"), e)
            })?;

        if self.cache.get(latest.id).is_none() {
            self.cache.insert(latest.id, parse_schema(&latest.schema)?);
        }
        Ok(latest.schema_ref())
    }

    /// Parsed schema for a registry id; cached after the first fetch.
    ///
    /// Only the fetch is retried. A definition that does not parse fails at once.
    pub async fn schema_by_id(&self, id: u32) -> Result<Arc<Schema>> {
        self.cache.ensure_open()?;
        if let Some(schema) = self.cache.get(id) {
            return Ok(schema);
        }

        let definition = self
            .policy
            .run("schema fetch", || self.api().schema_by_id(id))
            .await
            .map_err(|e| Error::exhausted(format!("Fetching schema id {id}"), e))?;
        let schema = parse_schema(&definition)?;
        debug!(schema_id = id, "Cached schema from registry");
        Ok(self.cache.insert(id, schema))
    }

    async fn resolve_latest(&self, topic: &str) -> Result<(u32, Arc<Schema>)> {
        let latest = self.lookup_latest(topic).await?;
        let schema = self.schema_by_id(latest.id).await?;
        Ok((latest.id, schema))
    }

    /// Build a serializer for `topic`, resolving its schema up front.
    pub async fn build_serializer(
        &self,
        topic: &str,
        config: &SerializerConfig,
    ) -> Result<AvroSerializer> {
        self.cache.ensure_open()?;
        let (schema_id, schema) = if let Some(id) = config.use_schema_id {
            (id, self.schema_by_id(id).await?)
        } else if config.use_latest_version {
            self.resolve_latest(topic).await?
        } else if config.auto_register_schemas {
            let definition = config.schema.as_deref().ok_or_else(|| {
                Error::InvalidConfig("auto_register_schemas requires a schema".to_string())
            })?;
            let id = self.register(topic, definition, config.normalize_schemas).await?;
            (id, self.schema_by_id(id).await?)
        } else {
            return Err(Error::InvalidConfig(
                "serializer needs use_schema_id, use_latest_version or auto_register_schemas"
                    .to_string(),
            ));
        };

        debug!(topic, schema_id, "Built Avro serializer");
        Ok(AvroSerializer::new(topic, schema_id, schema))
    }

    /// Build a deserializer for `topic`.
    pub async fn build_deserializer(
        &self,
        topic: &str,
        config: &DeserializerConfig,
    ) -> Result<AvroDeserializer> {
        self.cache.ensure_open()?;
        let reader_schema = if let Some(id) = config.use_schema_id {
            Some(self.schema_by_id(id).await?)
        } else if config.use_latest_version {
            Some(self.resolve_latest(topic).await?.1)
        } else {
            None
        };

        debug!(topic, reader_schema = reader_schema.is_some(), "Built Avro deserializer");
        Ok(AvroDeserializer::new(
            topic,
            Arc::clone(&self.cache),
            reader_schema,
        ))
    }

    /// Number of schemas held in the process-wide cache.
    pub fn cached_schemas(&self) -> usize {
        self.cache.len()
    }

    /// Release the registry. Later calls, including on deserializers built from
    /// this client, fail with [`Error::Closed`]. Calling it again is a no-op.
    pub fn close(&self) {
        if self.cache.close() {
            info!("Schema registry client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cache.ensure_open().is_err()
    }
}
