//! Persistent tier backends.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::path::Path;
use tracing::info;

use crate::error::CacheError;

/// Scoped key-value store behind the cache's persistent tier.
///
/// Values are opaque bytes; `put_if_absent` never overwrites.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` unless the key already exists. Returns whether it was written.
    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// sled tree that survives restarts
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        info!("Opening geocode cache at {}", path.display());
        let db = sled::open(path)?;
        info!("Geocode cache has {} entries", db.len());
        Ok(Self { db })
    }

    /// Store that lives only as long as this process
    pub fn temporary() -> Result<Self, CacheError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl CacheStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.db.get(key.as_bytes())?.map(|bytes| bytes.to_vec()))
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        let swapped = self
            .db
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(value))?;
        Ok(swapped.is_ok())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.db.clear()?;
        self.db.flush()?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.db.len()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn CacheStore) {
        assert!(store.is_empty());
        assert!(store.put_if_absent("k", b"first").unwrap());
        assert!(!store.put_if_absent("k", b"second").unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(store.get("missing").unwrap(), None);
        store.remove("k").unwrap();
        assert!(store.put_if_absent("k", b"again").unwrap());
        store.clear().unwrap();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_memory_store_write_once() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sled_store_write_once() {
        exercise(&SledStore::temporary().unwrap());
    }

    #[test]
    fn test_sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.put_if_absent("calle 5 cali", b"{}").unwrap();
            store.db.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
