//! Durable authoritative snapshot of all coordinator state.
//!
//! The whole snapshot is one JSON document stored under a single object key,
//! read and written with a load-mutate-save pattern. The coordinator's write
//! lock serializes writers; an absent object deserializes to the empty state
//! so a fresh deployment needs no bootstrap step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::objectstore::ObjectStore;
use crate::types::{
    Changeset, ChangesetId, Commit, DirectoryEntry, FileContent, FileId, GlobalState, Slice,
    SliceId, SliceMetadata,
};

/// Serialized authoritative state. Field layout mirrors the data model:
/// every volatile index table is derivable from what is stored here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DurableState {
    /// All slices by id
    #[serde(default)]
    pub slices: BTreeMap<SliceId, Slice>,
    /// Per-slice metadata by slice id
    #[serde(default)]
    pub metadata: BTreeMap<SliceId, SliceMetadata>,
    /// Per-slice commit history, newest first
    #[serde(default)]
    pub slice_commits: BTreeMap<SliceId, Vec<Commit>>,
    /// All changesets by id
    #[serde(default)]
    pub changesets: BTreeMap<ChangesetId, Changeset>,
    /// Per-slice changeset ids, newest first
    #[serde(default)]
    pub slice_changesets: BTreeMap<SliceId, Vec<ChangesetId>>,
    /// Directory entries by entry id; the parent->children projection is
    /// derived from this map on rebuild
    #[serde(default)]
    pub entries: BTreeMap<String, DirectoryEntry>,
    /// parent id -> path -> entry id
    #[serde(default)]
    pub entry_paths_by_parent: BTreeMap<String, BTreeMap<String, String>>,
    /// Global merged view; absent before the first update
    #[serde(default)]
    pub global_state: Option<GlobalState>,
}

impl DurableState {
    /// Returns the root slice if one has been initialized.
    pub fn root_slice(&self) -> Option<&Slice> {
        self.slices.values().find(|s| s.is_root)
    }
}

/// Accessor for the durable snapshot and the file-content blobs, owning the
/// key layout under a configurable prefix.
pub struct DurableStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl DurableStore {
    /// Creates a durable store over the given object store and key prefix.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, parts: &[&str]) -> String {
        format!("{}:{}", self.prefix, parts.join(":"))
    }

    fn state_key(&self) -> String {
        self.key(&["durable", "state"])
    }

    fn file_content_key(&self, file_id: &FileId) -> String {
        self.key(&["file_content", file_id.as_str()])
    }

    /// Loads the snapshot; an absent object yields the empty state.
    pub fn load(&self) -> Result<DurableState> {
        let raw = match self.store.get(&self.state_key()) {
            Ok(raw) => raw,
            Err(CoreError::ObjectMissing(_)) => return Ok(DurableState::default()),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&raw).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Persists the snapshot, replacing the previous document.
    pub fn save(&self, state: &DurableState) -> Result<()> {
        let raw =
            serde_json::to_vec(state).map_err(|e| CoreError::Serialization(e.to_string()))?;
        self.store.put(&self.state_key(), raw)
    }

    /// Load-mutate-save helper. The closure's error aborts without saving,
    /// leaving the stored document untouched.
    pub fn with_state<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut DurableState) -> Result<()>,
    {
        let mut state = self.load()?;
        mutate(&mut state)?;
        self.save(&state)
    }

    /// Writes a file-content blob under its own key.
    pub fn put_file_content(&self, content: &FileContent) -> Result<()> {
        let raw =
            serde_json::to_vec(content).map_err(|e| CoreError::Serialization(e.to_string()))?;
        self.store.put(&self.file_content_key(&content.file_id), raw)
    }

    /// Reads a file-content blob; absent blobs yield None.
    pub fn file_content(&self, file_id: &FileId) -> Result<Option<FileContent>> {
        let raw = match self.store.get(&self.file_content_key(file_id)) {
            Ok(raw) => raw,
            Err(CoreError::ObjectMissing(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Verifies the object store with a put, get, delete round trip.
    pub fn health_probe(&self) -> Result<()> {
        let key = self.key(&["healthcheck"]);
        self.store.put(&key, b"ok".to_vec())?;
        let read = self.store.get(&key);
        let _ = self.store.delete(&key);
        read.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectstore::MemoryObjectStore;
    use crate::types::Timestamp;

    fn make_store() -> DurableStore {
        DurableStore::new(Arc::new(MemoryObjectStore::new()), "test")
    }

    fn make_slice(id: &str) -> Slice {
        Slice {
            id: SliceId::new(id),
            name: id.to_string(),
            description: String::new(),
            files: vec![FileId::new("f1")],
            owners: vec!["alice".to_string()],
            created_by: "alice".to_string(),
            created_at: Timestamp::from_nanos(1),
            updated_at: Timestamp::from_nanos(1),
            parent: None,
            is_root: false,
        }
    }

    #[test]
    fn test_load_empty() {
        let store = make_store();
        let state = store.load().unwrap();
        assert!(state.slices.is_empty());
        assert!(state.global_state.is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = make_store();
        let mut state = DurableState::default();
        let slice = make_slice("s1");
        state.slices.insert(slice.id.clone(), slice.clone());
        state.metadata.insert(
            slice.id.clone(),
            SliceMetadata::empty(slice.id.clone(), Timestamp::from_nanos(1)),
        );
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.slices.len(), 1);
        assert_eq!(loaded.slices.get(&slice.id).unwrap(), &slice);
        assert_eq!(loaded.metadata.len(), 1);
    }

    #[test]
    fn test_with_state_mutation_persists() {
        let store = make_store();
        store
            .with_state(|state| {
                let slice = make_slice("s1");
                state.slices.insert(slice.id.clone(), slice);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.load().unwrap().slices.len(), 1);
    }

    #[test]
    fn test_with_state_error_leaves_state_untouched() {
        let store = make_store();
        let err = store.with_state(|state| {
            let slice = make_slice("s1");
            state.slices.insert(slice.id.clone(), slice);
            Err(CoreError::Internal("boom".to_string()))
        });
        assert!(err.is_err());
        assert!(store.load().unwrap().slices.is_empty());
    }

    #[test]
    fn test_file_content_roundtrip() {
        let store = make_store();
        let content = FileContent {
            file_id: FileId::new("f1"),
            path: "src/main.rs".to_string(),
            content: b"fn main() {}".to_vec(),
            size: 12,
            hash: "h".to_string(),
        };
        store.put_file_content(&content).unwrap();
        assert_eq!(store.file_content(&FileId::new("f1")).unwrap(), Some(content));
        assert_eq!(store.file_content(&FileId::new("absent")).unwrap(), None);
    }

    #[test]
    fn test_health_probe_cleans_up() {
        let objects = Arc::new(MemoryObjectStore::new());
        let store = DurableStore::new(objects.clone(), "test");
        store.health_probe().unwrap();
        assert!(matches!(
            objects.get("test:healthcheck"),
            Err(CoreError::ObjectMissing(_))
        ));
    }

    #[test]
    fn test_root_slice_lookup() {
        let mut state = DurableState::default();
        assert!(state.root_slice().is_none());
        let mut root = make_slice("root_slice");
        root.is_root = true;
        state.slices.insert(root.id.clone(), root);
        assert!(state.root_slice().is_some());
    }
}
