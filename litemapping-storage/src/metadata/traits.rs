//! Metadata store trait.

use litemapping_core::MappingResult;

/// Namespaced string-set store.
///
/// Each namespace holds named entries whose values are ordered string lists.
/// Implementations must be thread-safe and make each `put_string_set`
/// visible in full or not at all.
pub trait MetadataStore: Send + Sync {
    /// Read an entry. `Ok(None)` when the entry was never written.
    fn string_set(&self, namespace: &str, key: &str) -> MappingResult<Option<Vec<String>>>;

    /// Replace an entry.
    fn put_string_set(&self, namespace: &str, key: &str, values: &[String]) -> MappingResult<()>;

    /// Remove an entry. Returns whether it existed.
    fn remove(&self, namespace: &str, key: &str) -> MappingResult<bool>;
}

/// Flat key used by stores without native namespaces.
pub(crate) fn entry_key(namespace: &str, key: &str) -> String {
    format!("{}/{}", namespace, key)
}
