//! @ai:module:intent Durable key-value host storage with staged writes and atomic commit
//! @ai:module:layer infrastructure
//! @ai:module:public_api HostStore, StoreError, StorageMode, MemoryStore, FileStore, open_store

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Persisted crank counter, a decimal string.
pub const CRANK_NUMBER_KEY: &str = "crankNumber";
/// Persisted engine snapshot, JSON.
pub const ENGINE_STATE_KEY: &str = "engine.state";

/// @ai:intent Failures raised by the storage layer
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("no store found at {0}")]
    Missing(PathBuf),

    #[error("failed to persist store: {0}")]
    Persist(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("store is closed")]
    Closed,
}

/// @ai:intent Key-value storage whose writes become durable only on commit
///
/// `get` sees staged writes. `commit` makes every staged write durable at
/// once; `abort` drops them.
pub trait HostStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String);

    fn delete(&mut self, key: &str);

    /// @ai:intent Atomically persist all staged writes
    /// @ai:effects fs:write
    fn commit(&mut self) -> Result<(), StoreError>;

    /// @ai:intent Discard staged writes
    fn abort(&mut self);

    fn close(&mut self) -> Result<(), StoreError>;

    /// @ai:intent Bytes used on disk, when the backend has a disk footprint
    fn disk_usage(&self) -> Option<u64>;
}

/// @ai:intent Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    #[default]
    File,
}

impl FromStr for StorageMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StorageMode::Memory),
            "file" => Ok(StorageMode::File),
            other => Err(Error::Configuration(format!(
                "unknown storage mode: {}",
                other
            ))),
        }
    }
}

/// @ai:intent Open the configured backend, wiping it first when `reset` is set
/// @ai:effects fs:read, fs:write
pub fn open_store(
    mode: StorageMode,
    dir: &Path,
    reset: bool,
) -> Result<Box<dyn HostStore>, StoreError> {
    match mode {
        StorageMode::Memory => Ok(Box::new(MemoryStore::new())),
        StorageMode::File if reset => Ok(Box::new(FileStore::init(dir)?)),
        StorageMode::File => Ok(Box::new(FileStore::open_or_init(dir)?)),
    }
}

impl<S: HostStore + ?Sized> HostStore for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &str) {
        (**self).delete(key)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        (**self).commit()
    }

    fn abort(&mut self) {
        (**self).abort()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        (**self).close()
    }

    fn disk_usage(&self) -> Option<u64> {
        (**self).disk_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_mode_parses_known_modes() {
        assert_eq!("memory".parse::<StorageMode>().unwrap(), StorageMode::Memory);
        assert_eq!("file".parse::<StorageMode>().unwrap(), StorageMode::File);
    }

    #[test]
    fn test_unknown_storage_mode_is_configuration_error() {
        let err = "lmdb".parse::<StorageMode>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_open_store_reset_wipes_file_store() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("db");

        let mut store = open_store(StorageMode::File, &dir, false).unwrap();
        store.set(CRANK_NUMBER_KEY, "12".to_string());
        store.commit().unwrap();
        store.close().unwrap();

        let reopened = open_store(StorageMode::File, &dir, false).unwrap();
        assert_eq!(reopened.get(CRANK_NUMBER_KEY).as_deref(), Some("12"));

        let reset = open_store(StorageMode::File, &dir, true).unwrap();
        assert_eq!(reset.get(CRANK_NUMBER_KEY), None);
    }
}
