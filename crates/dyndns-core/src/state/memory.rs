// # Memory State Store
//
// In-memory cache. Nothing survives the process, so for the command-line
// tool it behaves like having no cache; it exists for library users that
// run the engine repeatedly in one process, and for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// In-memory state store
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl MemoryStateStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached records
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_record(&self, record_name: &str) -> Result<Option<StateRecord>, Error> {
        Ok(self.inner.read().await.get(record_name).cloned())
    }

    async fn set_record(&self, record_name: &str, record: &StateRecord) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(record_name.to_string(), record.clone());
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
