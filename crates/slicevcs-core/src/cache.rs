//! Volatile index cache: point-query tables mirroring the durable snapshot.
//!
//! The cache is an authoritative mirror, not a capacity-bounded cache: every
//! coordinator write updates durable state and these tables together, and
//! [`IndexCache::rebuild`] re-materializes everything from the snapshot after
//! a cold start or cache loss. The coordinator owns the instance behind its
//! read/write lock; nothing here synchronizes on its own.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::durable::DurableState;
use crate::types::{
    Changeset, ChangesetId, Commit, DirectoryEntry, FileConflict, FileId, GlobalState, Slice,
    SliceId, SliceMetadata,
};

/// Fast volatile mapping layer over the coordinator's records.
#[derive(Default)]
pub struct IndexCache {
    slices: HashMap<SliceId, Slice>,
    metadata: HashMap<SliceId, SliceMetadata>,
    /// Inverted index: file -> slices currently claiming it.
    file_index: HashMap<FileId, BTreeSet<SliceId>>,
    /// Per-slice commit log, newest first.
    slice_commits: HashMap<SliceId, VecDeque<Commit>>,
    changesets: HashMap<ChangesetId, Changeset>,
    /// Per-slice changeset ids, newest first.
    slice_changesets: HashMap<SliceId, Vec<ChangesetId>>,
    entries: HashMap<String, DirectoryEntry>,
    entry_by_parent_path: HashMap<(String, String), String>,
    entries_by_parent: HashMap<String, BTreeSet<String>>,
    global_state: Option<GlobalState>,
}

impl IndexCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every table and re-materializes the cache from the snapshot.
    ///
    /// The file index is derived from slice membership; merged-changeset
    /// claims are already folded into each slice's file list by the merge
    /// path, so membership alone reconstructs it. Idempotent.
    pub fn rebuild(&mut self, state: &DurableState) {
        *self = Self::default();

        for (id, slice) in &state.slices {
            for file in &slice.files {
                self.file_index
                    .entry(file.clone())
                    .or_default()
                    .insert(id.clone());
            }
            self.slices.insert(id.clone(), slice.clone());
        }
        for (id, meta) in &state.metadata {
            self.metadata.insert(id.clone(), meta.clone());
        }
        for (id, commits) in &state.slice_commits {
            self.slice_commits
                .insert(id.clone(), commits.iter().cloned().collect());
        }
        for (id, cs) in &state.changesets {
            self.changesets.insert(id.clone(), cs.clone());
        }
        for (id, ids) in &state.slice_changesets {
            self.slice_changesets.insert(id.clone(), ids.clone());
        }
        for (id, entry) in &state.entries {
            self.entry_by_parent_path
                .insert((entry.parent_id.clone(), entry.path.clone()), id.clone());
            self.entries_by_parent
                .entry(entry.parent_id.clone())
                .or_default()
                .insert(id.clone());
            self.entries.insert(id.clone(), entry.clone());
        }
        self.global_state = state.global_state.clone();
    }

    // Slices

    /// Looks up a slice by id.
    pub fn slice(&self, id: &SliceId) -> Option<&Slice> {
        self.slices.get(id)
    }

    /// Inserts or replaces a slice record.
    pub fn insert_slice(&mut self, slice: Slice) {
        self.slices.insert(slice.id.clone(), slice);
    }

    /// Returns true if the slice exists.
    pub fn contains_slice(&self, id: &SliceId) -> bool {
        self.slices.contains_key(id)
    }

    /// All slice ids, sorted.
    pub fn slice_ids(&self) -> Vec<SliceId> {
        let mut ids: Vec<SliceId> = self.slices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The root slice, if initialized.
    pub fn root_slice(&self) -> Option<&Slice> {
        self.slices.values().find(|s| s.is_root)
    }

    // Metadata

    /// Looks up slice metadata.
    pub fn metadata(&self, id: &SliceId) -> Option<&SliceMetadata> {
        self.metadata.get(id)
    }

    /// Inserts or replaces slice metadata.
    pub fn set_metadata(&mut self, meta: SliceMetadata) {
        self.metadata.insert(meta.slice_id.clone(), meta);
    }

    // File index

    /// Adds a file -> slice mapping.
    pub fn index_file(&mut self, file: FileId, slice: SliceId) {
        self.file_index.entry(file).or_default().insert(slice);
    }

    /// Removes a file -> slice mapping; the entry disappears with its last slice.
    pub fn unindex_file(&mut self, file: &FileId, slice: &SliceId) {
        if let Some(slices) = self.file_index.get_mut(file) {
            slices.remove(slice);
            if slices.is_empty() {
                self.file_index.remove(file);
            }
        }
    }

    /// Slices currently claiming a file, sorted by id.
    pub fn slices_for_file(&self, file: &FileId) -> Vec<SliceId> {
        self.file_index
            .get(file)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every file mapped to two or more slices, sorted by file id.
    pub fn conflicts(&self) -> Vec<FileConflict> {
        let mut conflicts: Vec<FileConflict> = self
            .file_index
            .iter()
            .filter(|(_, slices)| slices.len() >= 2)
            .map(|(file, slices)| FileConflict {
                file_id: file.clone(),
                conflicting_slices: slices.iter().cloned().collect(),
            })
            .collect();
        conflicts.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        conflicts
    }

    // Commits

    /// Prepends a commit to a slice's history.
    pub fn push_commit(&mut self, slice: &SliceId, commit: Commit) {
        self.slice_commits
            .entry(slice.clone())
            .or_default()
            .push_front(commit);
    }

    /// A slice's commit history, newest first.
    pub fn commits(&self, slice: &SliceId) -> Vec<Commit> {
        self.slice_commits
            .get(slice)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }

    // Changesets

    /// Looks up a changeset by id.
    pub fn changeset(&self, id: &ChangesetId) -> Option<&Changeset> {
        self.changesets.get(id)
    }

    /// Inserts or replaces a changeset record.
    pub fn insert_changeset(&mut self, cs: Changeset) {
        self.changesets.insert(cs.id.clone(), cs);
    }

    /// Prepends a changeset id to a slice's list.
    pub fn prepend_slice_changeset(&mut self, slice: &SliceId, id: ChangesetId) {
        self.slice_changesets
            .entry(slice.clone())
            .or_default()
            .insert(0, id);
    }

    /// A slice's changeset ids, newest first.
    pub fn slice_changeset_ids(&self, slice: &SliceId) -> Vec<ChangesetId> {
        self.slice_changesets.get(slice).cloned().unwrap_or_default()
    }

    // Entries

    /// Looks up an entry by id.
    pub fn entry(&self, id: &str) -> Option<&DirectoryEntry> {
        self.entries.get(id)
    }

    /// Resolves an entry id by `(parent_id, path)`.
    pub fn entry_id_by_path(&self, parent_id: &str, path: &str) -> Option<&String> {
        self.entry_by_parent_path
            .get(&(parent_id.to_string(), path.to_string()))
    }

    /// Entry ids under a parent, sorted.
    pub fn entry_ids_by_parent(&self, parent_id: &str) -> Vec<String> {
        self.entries_by_parent
            .get(parent_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Inserts an entry into all three entry tables.
    pub fn insert_entry(&mut self, entry: DirectoryEntry) {
        self.entry_by_parent_path
            .insert((entry.parent_id.clone(), entry.path.clone()), entry.id.clone());
        self.entries_by_parent
            .entry(entry.parent_id.clone())
            .or_default()
            .insert(entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Replaces an entry record, keeping the secondary indexes coherent.
    pub fn replace_entry(&mut self, entry: DirectoryEntry) {
        if let Some(old) = self.entries.get(&entry.id) {
            self.entry_by_parent_path
                .remove(&(old.parent_id.clone(), old.path.clone()));
            if let Some(ids) = self.entries_by_parent.get_mut(&old.parent_id) {
                ids.remove(&entry.id);
            }
        }
        self.insert_entry(entry);
    }

    /// Removes an entry and both secondary indexes.
    pub fn remove_entry(&mut self, id: &str) -> Option<DirectoryEntry> {
        let entry = self.entries.remove(id)?;
        self.entry_by_parent_path
            .remove(&(entry.parent_id.clone(), entry.path.clone()));
        if let Some(ids) = self.entries_by_parent.get_mut(&entry.parent_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.entries_by_parent.remove(&entry.parent_id);
            }
        }
        Some(entry)
    }

    // Global state

    /// The cached global state snapshot.
    pub fn global_state(&self) -> Option<&GlobalState> {
        self.global_state.as_ref()
    }

    /// Replaces the cached global state snapshot.
    pub fn set_global_state(&mut self, state: GlobalState) {
        self.global_state = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn make_slice(id: &str, files: &[&str]) -> Slice {
        Slice {
            id: SliceId::new(id),
            name: id.to_string(),
            description: String::new(),
            files: files.iter().map(|f| FileId::new(*f)).collect(),
            owners: Vec::new(),
            created_by: String::new(),
            created_at: Timestamp::from_nanos(1),
            updated_at: Timestamp::from_nanos(1),
            parent: None,
            is_root: false,
        }
    }

    #[test]
    fn test_file_index_add_remove() {
        let mut cache = IndexCache::new();
        cache.index_file(FileId::new("f"), SliceId::new("s1"));
        cache.index_file(FileId::new("f"), SliceId::new("s2"));
        assert_eq!(
            cache.slices_for_file(&FileId::new("f")),
            vec![SliceId::new("s1"), SliceId::new("s2")]
        );

        cache.unindex_file(&FileId::new("f"), &SliceId::new("s1"));
        assert_eq!(
            cache.slices_for_file(&FileId::new("f")),
            vec![SliceId::new("s2")]
        );

        // Removing the last slice deletes the entry entirely.
        cache.unindex_file(&FileId::new("f"), &SliceId::new("s2"));
        assert!(cache.slices_for_file(&FileId::new("f")).is_empty());
        assert!(cache.conflicts().is_empty());
    }

    #[test]
    fn test_conflicts_sorted() {
        let mut cache = IndexCache::new();
        cache.index_file(FileId::new("z"), SliceId::new("s2"));
        cache.index_file(FileId::new("z"), SliceId::new("s1"));
        cache.index_file(FileId::new("a"), SliceId::new("s1"));
        cache.index_file(FileId::new("a"), SliceId::new("s3"));
        cache.index_file(FileId::new("solo"), SliceId::new("s1"));

        let conflicts = cache.conflicts();
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].file_id, FileId::new("a"));
        assert_eq!(
            conflicts[0].conflicting_slices,
            vec![SliceId::new("s1"), SliceId::new("s3")]
        );
        assert_eq!(conflicts[1].file_id, FileId::new("z"));
        assert_eq!(
            conflicts[1].conflicting_slices,
            vec![SliceId::new("s1"), SliceId::new("s2")]
        );
    }

    #[test]
    fn test_commit_order_newest_first() {
        let mut cache = IndexCache::new();
        let slice = SliceId::new("s1");
        for i in 1..=3 {
            cache.push_commit(
                &slice,
                Commit {
                    commit_hash: format!("c{i}"),
                    parent_hash: String::new(),
                    timestamp: Timestamp::from_nanos(i),
                    message: String::new(),
                },
            );
        }
        let commits = cache.commits(&slice);
        assert_eq!(commits[0].commit_hash, "c3");
        assert_eq!(commits[2].commit_hash, "c1");
    }

    #[test]
    fn test_entry_indexes() {
        let mut cache = IndexCache::new();
        let entry = DirectoryEntry {
            id: "e1".to_string(),
            path: "src/main.rs".to_string(),
            kind: crate::types::EntryKind::File,
            parent_id: "s1".to_string(),
            content: None,
            size: 0,
        };
        cache.insert_entry(entry.clone());
        assert_eq!(cache.entry("e1"), Some(&entry));
        assert_eq!(
            cache.entry_id_by_path("s1", "src/main.rs"),
            Some(&"e1".to_string())
        );
        assert_eq!(cache.entry_ids_by_parent("s1"), vec!["e1".to_string()]);

        cache.remove_entry("e1");
        assert!(cache.entry("e1").is_none());
        assert!(cache.entry_id_by_path("s1", "src/main.rs").is_none());
        assert!(cache.entry_ids_by_parent("s1").is_empty());
    }

    #[test]
    fn test_rebuild_from_snapshot() {
        let mut state = DurableState::default();
        let slice = make_slice("s1", &["a", "b"]);
        state.slices.insert(slice.id.clone(), slice.clone());
        state.metadata.insert(
            slice.id.clone(),
            SliceMetadata::empty(slice.id.clone(), Timestamp::from_nanos(1)),
        );
        state.slice_commits.insert(
            slice.id.clone(),
            vec![Commit {
                commit_hash: "c1".to_string(),
                parent_hash: String::new(),
                timestamp: Timestamp::from_nanos(2),
                message: "init".to_string(),
            }],
        );

        let mut cache = IndexCache::new();
        // Pre-populate with garbage that rebuild must discard.
        cache.index_file(FileId::new("stale"), SliceId::new("gone"));
        cache.rebuild(&state);

        assert!(cache.contains_slice(&slice.id));
        assert_eq!(
            cache.slices_for_file(&FileId::new("a")),
            vec![slice.id.clone()]
        );
        assert!(cache.slices_for_file(&FileId::new("stale")).is_empty());
        assert_eq!(cache.commits(&slice.id).len(), 1);

        // Rebuild is idempotent.
        cache.rebuild(&state);
        assert_eq!(cache.slice_ids(), vec![slice.id.clone()]);
    }

    #[test]
    fn test_replace_entry_moves_path_index() {
        let mut cache = IndexCache::new();
        let mut entry = DirectoryEntry {
            id: "e1".to_string(),
            path: "old.rs".to_string(),
            kind: crate::types::EntryKind::File,
            parent_id: "s1".to_string(),
            content: None,
            size: 0,
        };
        cache.insert_entry(entry.clone());

        entry.path = "new.rs".to_string();
        cache.replace_entry(entry);
        assert!(cache.entry_id_by_path("s1", "old.rs").is_none());
        assert_eq!(
            cache.entry_id_by_path("s1", "new.rs"),
            Some(&"e1".to_string())
        );
    }
}
