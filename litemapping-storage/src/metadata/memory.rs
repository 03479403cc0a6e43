//! In-memory metadata store for tests and throwaway handles.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use litemapping_core::{MappingResult, StorageError};

use super::traits::{entry_key, MetadataStore};

/// Metadata kept in a shared map. Clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    entries: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    StorageError::MetadataFailure {
        reason: "metadata lock poisoned".to_string(),
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn string_set(&self, namespace: &str, key: &str) -> MappingResult<Option<Vec<String>>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(&entry_key(namespace, key)).cloned())
    }

    fn put_string_set(&self, namespace: &str, key: &str, values: &[String]) -> MappingResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(entry_key(namespace, key), values.to_vec());
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> MappingResult<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(&entry_key(namespace, key)).is_some())
    }
}
