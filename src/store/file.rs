//! @ai:module:intent Directory-backed host store with atomic replace-on-commit
//! @ai:module:layer infrastructure
//! @ai:module:public_api FileStore
//! @ai:module:stateless false

use crate::store::{HostStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const STORE_FILE: &str = "store.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    entries: BTreeMap<String, String>,
}

/// @ai:intent Host store persisted as one JSON file, replaced atomically on commit
pub struct FileStore {
    dir: PathBuf,
    committed: BTreeMap<String, String>,
    staged: BTreeMap<String, Option<String>>,
    closed: bool,
}

impl FileStore {
    /// @ai:intent Open an existing store directory
    /// @ai:pre dir contains a store written by `init` or a commit
    /// @ai:effects fs:read
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(STORE_FILE);
        if !path.exists() {
            return Err(StoreError::Missing(dir.to_path_buf()));
        }

        let content = std::fs::read_to_string(&path)?;
        let file: StoreFile = serde_json::from_str(&content)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            committed: file.entries,
            staged: BTreeMap::new(),
            closed: false,
        })
    }

    /// @ai:intent Create an empty store, discarding anything already there
    /// @ai:effects fs:write
    pub fn init(dir: &Path) -> Result<Self, StoreError> {
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;

        let mut store = Self {
            dir: dir.to_path_buf(),
            committed: BTreeMap::new(),
            staged: BTreeMap::new(),
            closed: false,
        };
        store.write_committed()?;
        Ok(store)
    }

    /// @ai:intent Open the store if present, otherwise create it
    /// @ai:effects fs:read, fs:write
    pub fn open_or_init(dir: &Path) -> Result<Self, StoreError> {
        if dir.join(STORE_FILE).exists() {
            Self::open(dir)
        } else {
            Self::init(dir)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// @ai:intent Replace the store file with the committed map
    /// @ai:effects fs:write
    fn write_committed(&mut self) -> Result<(), StoreError> {
        let file = StoreFile {
            entries: self.committed.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(STORE_FILE))
            .map_err(|e| StoreError::Persist(e.to_string()))?;
        Ok(())
    }
}

impl HostStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => self.committed.get(key).cloned(),
        }
    }

    fn set(&mut self, key: &str, value: String) {
        self.staged.insert(key.to_string(), Some(value));
    }

    fn delete(&mut self, key: &str) {
        self.staged.insert(key.to_string(), None);
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }

        let previous = self.committed.clone();
        for (key, value) in &self.staged {
            match value {
                Some(value) => self.committed.insert(key.clone(), value.clone()),
                None => self.committed.remove(key),
            };
        }

        if let Err(err) = self.write_committed() {
            self.committed = previous;
            return Err(err);
        }

        self.staged.clear();
        Ok(())
    }

    fn abort(&mut self) {
        self.staged.clear();
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.staged.clear();
        self.closed = true;
        Ok(())
    }

    fn disk_usage(&self) -> Option<u64> {
        let total = WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum();
        Some(total)
    }
}
