//! Filesystem storage.
//!
//! Handles reading and writing to the local data directory:
//! - Raw downloaded snapshot documents
//! - The period-partitioned Parquet snapshot table
//! - The read-only copy served to readers

pub mod parquet;
pub mod schema;
pub mod store;
pub mod table;

use std::path::PathBuf;

use arrow::error::ArrowError;
use ::parquet::errors::ParquetError;
use thiserror::Error;

pub use store::{FileStamp, SnapshotStore};
pub use table::SnapshotTable;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Primary snapshot table.
    pub fn table_path(&self) -> PathBuf {
        self.store_dir().join("usage.parquet")
    }

    /// Default location of the published read copy.
    pub fn read_copy_path(&self) -> PathBuf {
        self.store_dir().join("usage_read.parquet")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));

        assert_eq!(config.raw_dir(), PathBuf::from("/data/raw"));
        assert_eq!(config.store_dir(), PathBuf::from("/data/store"));
        assert_eq!(config.table_path(), PathBuf::from("/data/store/usage.parquet"));
        assert_eq!(
            config.read_copy_path(),
            PathBuf::from("/data/store/usage_read.parquet")
        );
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }
}
