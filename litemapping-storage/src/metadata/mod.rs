//! Persistent metadata kept next to the database.
//!
//! The only entry the mapper relies on is the known column set of each table
//! (stored under [`KEY_ALL_COLUMN`](litemapping_core::KEY_ALL_COLUMN) in the
//! table's `"<database>.<table>"` namespace). Upgrades diff the declared
//! columns against it to decide what to add.

pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use lmdb_backend::{LmdbMetadataError, LmdbMetadataStore};
pub use memory::InMemoryMetadataStore;
pub use traits::MetadataStore;
