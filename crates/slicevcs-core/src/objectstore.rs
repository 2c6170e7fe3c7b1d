//! Opaque byte blob store keyed by string.
//!
//! The trait is intentionally tiny: an in-memory map for tests and a cloud
//! blob backend in production implement the same three calls. Reads and
//! writes are each atomic at the object level; there are no cross-key
//! transactions.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{CoreError, Result};

/// Object store abstraction for durable blobs.
///
/// `get` and `delete` of an absent key surface [`CoreError::ObjectMissing`];
/// every other failure is reported as [`CoreError::Unavailable`].
pub trait ObjectStore: Send + Sync {
    /// Stores the payload under the key, overwriting any existing object.
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Retrieves the payload stored under the key.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Removes the object stored under the key.
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory object store backed by a HashMap. Thread-safe via RwLock.
///
/// Used in tests and as the default backend of the standalone server; it
/// does not persist data across process restarts.
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Creates a new empty in-memory object store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| CoreError::Unavailable(e.to_string()))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .read()
            .map_err(|e| CoreError::Unavailable(e.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::ObjectMissing(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| CoreError::Unavailable(e.to_string()))?;
        match objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(CoreError::ObjectMissing(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let store = MemoryObjectStore::new();
        store.put("k1", b"v1".to_vec()).unwrap();
        assert_eq!(store.get("k1").unwrap(), b"v1");
    }

    #[test]
    fn test_get_missing() {
        let store = MemoryObjectStore::new();
        match store.get("absent") {
            Err(CoreError::ObjectMissing(key)) => assert_eq!(key, "absent"),
            other => panic!("expected ObjectMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_overwrite() {
        let store = MemoryObjectStore::new();
        store.put("k", b"old".to_vec()).unwrap();
        store.put("k", b"new".to_vec()).unwrap();
        assert_eq!(store.get("k").unwrap(), b"new");
    }

    #[test]
    fn test_delete() {
        let store = MemoryObjectStore::new();
        store.put("k", b"v".to_vec()).unwrap();
        store.delete("k").unwrap();
        assert!(matches!(store.get("k"), Err(CoreError::ObjectMissing(_))));
    }

    #[test]
    fn test_delete_missing() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.delete("absent"),
            Err(CoreError::ObjectMissing(_))
        ));
    }
}
