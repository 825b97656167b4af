use crate::api::RegistryApi;
use crate::error::{Error, Result};
use apache_avro::Schema;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Parsed schemas by registry id, kept for the lifetime of the process.
///
/// Schema ids are immutable in the registry, so entries never expire.
pub(crate) struct SchemaCache {
    api: Arc<dyn RegistryApi>,
    schemas: RwLock<HashMap<u32, Arc<Schema>>>,
    closed: AtomicBool,
}

impl SchemaCache {
    pub(crate) fn new(api: Arc<dyn RegistryApi>) -> Self {
        Self {
            api,
            schemas: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn api(&self) -> &Arc<dyn RegistryApi> {
        &self.api
    }

    /// Marks the cache closed and drops all entries. Returns false if it was already closed.
    pub(crate) fn close(&self) -> bool {
        let was_open = !self.closed.swap(true, Ordering::SeqCst);
        self.schemas
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        was_open
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    pub(crate) fn get(&self, id: u32) -> Option<Arc<Schema>> {
        self.schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    pub(crate) fn insert(&self, id: u32, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.schemas
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, Arc::clone(&schema));
        schema
    }

    /// Cached schema for `id`, fetching and parsing it on first use.
    pub(crate) async fn schema(&self, id: u32) -> Result<Arc<Schema>> {
        self.ensure_open()?;
        if let Some(schema) = self.get(id) {
            return Ok(schema);
        }
        let text = self.api.schema_by_id(id).await?;
        let schema = parse_schema(&text)?;
        tracing::debug!(schema_id = id, "Cached schema from registry");
        Ok(self.insert(id, schema))
    }

    pub(crate) fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

pub(crate) fn parse_schema(text: &str) -> Result<Schema> {
    Schema::parse_str(text).map_err(|e| Error::InvalidSchema(e.to_string()))
}
