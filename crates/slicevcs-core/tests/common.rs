//! Common fixtures for coordinator integration tests.

use std::sync::Arc;

use slicevcs_core::objectstore::MemoryObjectStore;
use slicevcs_core::types::{Changeset, ChangesetId, ChangesetStatus, FileId, Slice, SliceId, Timestamp};
use slicevcs_core::Coordinator;

/// A coordinator plus the object store behind it, so tests can simulate a
/// crash by building a second coordinator over the same store.
pub struct TestHarness {
    pub store: Arc<MemoryObjectStore>,
    pub coordinator: Coordinator,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryObjectStore::new());
        let coordinator = Coordinator::new(store.clone(), "test").unwrap();
        Self { store, coordinator }
    }

    /// Builds a fresh coordinator over the same durable storage, as after a
    /// process restart that lost all volatile state.
    pub fn restart(&self) -> Coordinator {
        Coordinator::new(self.store.clone(), "test").unwrap()
    }
}

pub fn slice(id: &str, files: &[&str]) -> Slice {
    Slice {
        id: SliceId::new(id),
        name: format!("Slice {id}"),
        description: format!("test slice {id}"),
        files: files.iter().map(|f| FileId::new(*f)).collect(),
        owners: vec!["alice".to_string()],
        created_by: "alice".to_string(),
        created_at: Timestamp::ZERO,
        updated_at: Timestamp::ZERO,
        parent: None,
        is_root: false,
    }
}

pub fn changeset(id: &str, slice: &str, files: &[&str], message: &str) -> Changeset {
    Changeset {
        id: ChangesetId::new(id),
        hash: String::new(),
        slice_id: SliceId::new(slice),
        base_commit_hash: String::new(),
        modified_files: files.iter().map(|f| FileId::new(*f)).collect(),
        status: ChangesetStatus::Pending,
        author: "alice".to_string(),
        message: message.to_string(),
        created_at: Timestamp::ZERO,
        merged_at: None,
    }
}
