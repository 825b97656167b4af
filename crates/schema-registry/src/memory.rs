//! In-process [`RegistryApi`] for tests and local development.

use crate::api::{RegisteredSchema, RegistryApi};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    /// Schema text by id; ids start at 1
    schemas: Vec<String>,
    /// Schema ids per subject in version order
    subjects: HashMap<String, Vec<u32>>,
}

/// Registry kept entirely in memory.
///
/// Deduplicates identical schema text per subject the way a real registry does,
/// and can be told to fail a number of upcoming calls to exercise retry paths.
#[derive(Default)]
pub struct MemoryRegistry {
    state: Mutex<State>,
    failures_remaining: AtomicU32,
    calls: AtomicU32,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with a connection error.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Total number of calls received, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Register a schema without going through the API, returning its id.
    pub fn insert(&self, subject: &str, schema: &str) -> u32 {
        let mut state = self.lock();
        register_locked(&mut state, subject, schema)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind, still usable
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::Connection("injected registry failure".to_string()));
        }
        Ok(())
    }
}

fn register_locked(state: &mut State, subject: &str, schema: &str) -> u32 {
    let existing = state.subjects.get(subject).and_then(|ids| {
        ids.iter()
            .copied()
            .find(|id| state.schemas[(*id - 1) as usize] == schema)
    });
    if let Some(id) = existing {
        return id;
    }

    let id = match state.schemas.iter().position(|s| s == schema) {
        Some(index) => index as u32 + 1,
        None => {
            state.schemas.push(schema.to_string());
            state.schemas.len() as u32
        }
    };
    state
        .subjects
        .entry(subject.to_string())
        .or_default()
        .push(id);
    id
}

#[async_trait::async_trait]
impl RegistryApi for MemoryRegistry {
    async fn check_connection(&self) -> Result<()> {
        self.begin_call()
    }

    async fn register(&self, subject: &str, schema: &str, _normalize: bool) -> Result<u32> {
        self.begin_call().map_err(|e| Error::Registration {
            subject: subject.to_string(),
            message: e.to_string(),
        })?;
        let mut state = self.lock();
        Ok(register_locked(&mut state, subject, schema))
    }

    async fn schema_by_id(&self, id: u32) -> Result<String> {
        self.begin_call()?;
        let state = self.lock();
        id.checked_sub(1)
            .and_then(|index| state.schemas.get(index as usize))
            .cloned()
            .ok_or_else(|| Error::Lookup(format!("schema id {id} not found")))
    }

    async fn latest_version(&self, subject: &str) -> Result<RegisteredSchema> {
        self.begin_call()?;
        let state = self.lock();
        let ids = state
            .subjects
            .get(subject)
            .filter(|ids| !ids.is_empty())
            .ok_or_else(|| Error::Lookup(format!("subject '{subject}' not found")))?;
        let id = ids[ids.len() - 1];
        Ok(RegisteredSchema {
            subject: subject.to_string(),
            id,
            version: ids.len() as u32,
            schema: state.schemas[(id - 1) as usize].clone(),
        })
    }
}
