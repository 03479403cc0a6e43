//! LMDB-backed metadata store.
//!
//! Uses heed to keep the per-table metadata in a small memory-mapped
//! environment next to the database files. Every write is its own LMDB write
//! transaction, so an entry is replaced atomically or not at all.
//!
//! # Layout
//!
//! Keys are `"<namespace>/<entry>"` encoded as UTF-8; values are the entry's
//! string list encoded as a JSON array.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use litemapping_core::{MappingResult, StorageError};

use super::traits::{entry_key, MetadataStore};

/// Error type for LMDB metadata operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbMetadataError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbMetadataError> for litemapping_core::MappingError {
    fn from(e: LmdbMetadataError) -> Self {
        litemapping_core::MappingError::Storage(StorageError::MetadataFailure {
            reason: e.to_string(),
        })
    }
}

/// Metadata store persisted in an LMDB environment.
///
/// # Example
///
/// ```ignore
/// use litemapping_storage::metadata::{LmdbMetadataStore, MetadataStore};
///
/// let store = LmdbMetadataStore::new("data/metadata", 10)?;
/// store.put_string_set("app.users", "AllColumn", &["name".to_string()])?;
/// ```
pub struct LmdbMetadataStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbMetadataStore {
    /// Open (or create) the store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbMetadataError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbMetadataError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbMetadataError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "opened metadata store");
        Ok(Self { env, db })
    }

    /// Number of entries across all namespaces.
    pub fn len(&self) -> Result<u64, LmdbMetadataError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;
        self.db
            .len(&rtxn)
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, LmdbMetadataError> {
        Ok(self.len()? == 0)
    }
}

impl MetadataStore for LmdbMetadataStore {
    fn string_set(&self, namespace: &str, key: &str) -> MappingResult<Option<Vec<String>>> {
        let encoded_key = entry_key(namespace, key);

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        match self.db.get(&rtxn, encoded_key.as_bytes()) {
            Ok(Some(bytes)) => {
                let values: Vec<String> = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbMetadataError::Deserialization(e.to_string()))?;
                Ok(Some(values))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(LmdbMetadataError::Transaction(e.to_string()).into()),
        }
    }

    fn put_string_set(&self, namespace: &str, key: &str, values: &[String]) -> MappingResult<()> {
        let encoded_key = entry_key(namespace, key);
        let bytes = serde_json::to_vec(values)
            .map_err(|e| LmdbMetadataError::Serialization(e.to_string()))?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, encoded_key.as_bytes(), &bytes)
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        tracing::debug!(namespace, key, count = values.len(), "stored metadata entry");
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> MappingResult<bool> {
        let encoded_key = entry_key(namespace, key);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, encoded_key.as_bytes())
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbMetadataError::Transaction(e.to_string()))?;

        Ok(deleted)
    }
}
