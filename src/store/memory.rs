//! @ai:module:intent In-memory host store whose committed map outlives reopen
//! @ai:module:layer infrastructure
//! @ai:module:public_api MemoryStore
//! @ai:module:stateless false

use crate::store::{HostStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// @ai:intent Host store backed by a shared committed map plus a private staging area
///
/// `reopen` hands out a fresh store over the same committed map, which is how
/// tests model a process restart.
pub struct MemoryStore {
    committed: Arc<Mutex<BTreeMap<String, String>>>,
    staged: BTreeMap<String, Option<String>>,
    commits: Arc<Mutex<u64>>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            committed: Arc::new(Mutex::new(BTreeMap::new())),
            staged: BTreeMap::new(),
            commits: Arc::new(Mutex::new(0)),
            closed: false,
        }
    }

    /// @ai:intent Open another handle on the same durable data, without staged writes
    /// @ai:effects pure
    pub fn reopen(&self) -> Self {
        Self {
            committed: Arc::clone(&self.committed),
            staged: BTreeMap::new(),
            commits: Arc::clone(&self.commits),
            closed: false,
        }
    }

    /// @ai:intent Number of successful commits across all handles
    pub fn commit_count(&self) -> u64 {
        *self.commits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// @ai:intent Value as of the last commit, ignoring staged writes
    pub fn committed_value(&self, key: &str) -> Option<String> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HostStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => self.committed_value(key),
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

        let mut committed = self.committed.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in std::mem::take(&mut self.staged) {
            match value {
                Some(value) => committed.insert(key, value),
                None => committed.remove(&key),
            };
        }
        *self.commits.lock().unwrap_or_else(PoisonError::into_inner) += 1;
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
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_writes_are_visible_but_not_durable() {
        let mut store = MemoryStore::new();
        store.set("k", "v".to_string());

        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.committed_value("k"), None);
        assert_eq!(store.reopen().get("k"), None);
    }

    #[test]
    fn test_commit_survives_reopen() {
        let mut store = MemoryStore::new();
        store.set("k", "v".to_string());
        store.commit().unwrap();
        store.set("k", "later".to_string());

        let reopened = store.reopen();
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
        assert_eq!(reopened.commit_count(), 1);
    }

    #[test]
    fn test_abort_and_delete() {
        let mut store = MemoryStore::new();
        store.set("a", "1".to_string());
        store.set("b", "2".to_string());
        store.commit().unwrap();

        store.delete("a");
        assert_eq!(store.get("a"), None);
        store.abort();
        assert_eq!(store.get("a").as_deref(), Some("1"));

        store.delete("b");
        store.commit().unwrap();
        assert_eq!(store.reopen().get("b"), None);
    }

    #[test]
    fn test_closed_store_refuses_commit() {
        let mut store = MemoryStore::new();
        store.close().unwrap();
        assert!(matches!(store.commit(), Err(StoreError::Closed)));
    }
}
