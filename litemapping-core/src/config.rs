//! Configuration types

use crate::{ConfigError, MappingResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Entry name under which the known column set is persisted.
pub const KEY_ALL_COLUMN: &str = "AllColumn";

/// Database and table named by a `"<database>/<table>"` path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentity {
    pub database: String,
    pub table: String,
}

impl TableIdentity {
    /// Split `"<database>/<table>"`.
    ///
    /// Both parts must be non-empty identifiers since they end up in file
    /// names and SQL.
    pub fn parse(path: &str) -> MappingResult<Self> {
        let invalid = || ConfigError::InvalidPath {
            path: path.to_string(),
        };
        let (database, table) = path.split_once('/').ok_or_else(invalid)?;
        if !is_identifier(database) || !is_identifier(table) {
            return Err(invalid().into());
        }
        Ok(Self {
            database: database.to_string(),
            table: table.to_string(),
        })
    }

    /// File name of the database, relative to the data directory.
    pub fn database_file(&self) -> String {
        format!("{}.db", self.database)
    }

    /// Metadata store namespace: `"<database>.<table>"`.
    pub fn metadata_namespace(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

/// ASCII letter or underscore, then letters, digits or underscores.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Settings for opening a mapping handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// `"<database>/<table>"`
    pub path: String,
    /// Directory holding database files and the metadata store.
    pub data_dir: PathBuf,
    /// Declared schema version; starts at 1.
    pub version: u32,
    /// Maximum size of the metadata store in megabytes.
    pub metadata_map_size_mb: usize,
}

impl MappingConfig {
    pub const DEFAULT_DATA_DIR: &'static str = "data";
    pub const DEFAULT_METADATA_MAP_SIZE_MB: usize = 10;

    pub fn new(path: impl Into<String>, version: u32) -> Self {
        Self {
            path: path.into(),
            data_dir: PathBuf::from(Self::DEFAULT_DATA_DIR),
            version,
            metadata_map_size_mb: Self::DEFAULT_METADATA_MAP_SIZE_MB,
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `LITEMAPPING_DATA_DIR`: data directory (default: `data`)
    /// - `LITEMAPPING_METADATA_MAP_SIZE_MB`: metadata store size (default: 10)
    pub fn from_env(path: impl Into<String>, version: u32) -> Self {
        let defaults = Self::new(path, version);

        Self {
            data_dir: std::env::var("LITEMAPPING_DATA_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir.clone()),
            metadata_map_size_mb: std::env::var("LITEMAPPING_METADATA_MAP_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.metadata_map_size_mb),
            ..defaults
        }
    }

    /// Validate the configuration and return the parsed table identity.
    pub fn validate(&self) -> MappingResult<TableIdentity> {
        let identity = TableIdentity::parse(&self.path)?;

        if self.version == 0 {
            return Err(ConfigError::InvalidValue {
                field: "version".to_string(),
                value: self.version.to_string(),
                reason: "version must be at least 1".to_string(),
            }
            .into());
        }

        if self.metadata_map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metadata_map_size_mb".to_string(),
                value: self.metadata_map_size_mb.to_string(),
                reason: "metadata_map_size_mb must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(identity)
    }

    pub fn database_path(&self, identity: &TableIdentity) -> PathBuf {
        self.data_dir.join(identity.database_file())
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.data_dir.join("metadata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MappingError;

    #[test]
    fn test_parse_identity() {
        let identity = TableIdentity::parse("app/users").unwrap();
        assert_eq!(identity.database, "app");
        assert_eq!(identity.table, "users");
        assert_eq!(identity.database_file(), "app.db");
        assert_eq!(identity.metadata_namespace(), "app.users");
    }

    #[test]
    fn test_parse_identity_rejects_bad_paths() {
        for path in ["users", "/users", "app/", "app/users/extra", "app/us ers", "1db/t"] {
            let err = TableIdentity::parse(path).unwrap_err();
            assert!(
                matches!(err, MappingError::Config(ConfigError::InvalidPath { .. })),
                "{path}"
            );
        }
    }

    #[test]
    fn test_validate() {
        let config = MappingConfig::new("app/users", 1).with_data_dir("/tmp/x");
        let identity = config.validate().unwrap();
        assert_eq!(
            config.database_path(&identity),
            PathBuf::from("/tmp/x/app.db")
        );

        let err = MappingConfig::new("app/users", 0).validate().unwrap_err();
        assert!(matches!(
            err,
            MappingError::Config(ConfigError::InvalidValue { .. })
        ));

        let mut config = MappingConfig::new("app/users", 2);
        config.metadata_map_size_mb = 0;
        assert!(config.validate().is_err());
    }
}
