//! The coordinator: slice lifecycle, changeset lifecycle, conflict
//! detection/resolution, and global batch merge.
//!
//! One instance per process owns all mutable state. The index cache sits
//! behind a single read/write lock; every mutating operation persists the
//! durable snapshot before touching the cache, so a failed write leaves the
//! system in its pre-call state. Merges additionally take per-slice and
//! per-file entries in the lock table so concurrent merges sharing a file
//! serialize while disjoint merges proceed in parallel.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::IndexCache;
use crate::clock::IdClock;
use crate::durable::{DurableState, DurableStore};
use crate::error::{CoreError, Result};
use crate::health::{ComponentHealth, HealthReport};
use crate::locktable::LockTable;
use crate::objectstore::ObjectStore;
use crate::types::{
    Changeset, ChangesetId, ChangesetStatus, Commit, DirectoryEntry, FileConflict, FileContent,
    FileId, GlobalCommit, GlobalState, Slice, SliceId, SliceMetadata, Timestamp,
};
use crate::watch::{ConflictUpdate, WatchManager};

/// Bounded retries for the optimistic global-state update.
const MAX_GLOBAL_STATE_ATTEMPTS: usize = 5;
/// Queue bound per conflict watcher before updates are dropped.
const MAX_PENDING_WATCH_UPDATES: usize = 256;

/// Outcome status of a merge attempt
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStatus {
    /// The changeset was merged and the slice head advanced
    Success,
    /// File-level conflicts block the merge; nothing changed
    Conflict,
}

/// Result of [`Coordinator::merge_changeset`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Success or Conflict
    pub status: MergeStatus,
    /// The changeset that was merged (or blocked)
    pub changeset_id: ChangesetId,
    /// The new head commit hash; empty on conflict
    pub new_commit_hash: String,
    /// Conflicting files with the other claimants; empty on success
    pub conflicts: Vec<FileConflict>,
}

/// Result of [`Coordinator::rebase_changeset`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebaseOutcome {
    /// The rebased changeset
    pub changeset_id: ChangesetId,
    /// The freshly minted base commit hash
    pub new_base_commit_hash: String,
}

/// Review verdict for a changeset
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Not yet reviewed
    PendingReview,
    /// No blockers found
    ReadyForMerge,
    /// Changes requested by a reviewer
    ChangesRequested,
}

/// File and line counts summarizing a changeset.
///
/// Bodies are not diffed at file granularity, so every modified file counts
/// as an addition and contributes one line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Files added by the changeset
    pub files_added: u32,
    /// Files modified in place
    pub files_modified: u32,
    /// Files deleted
    pub files_deleted: u32,
    /// Lines added
    pub lines_added: u64,
    /// Lines removed
    pub lines_removed: u64,
}

/// Result of [`Coordinator::review_changeset`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// The reviewed changeset
    pub changeset: Changeset,
    /// Summary of the proposed changes
    pub diff: DiffSummary,
    /// Review verdict
    pub status: ReviewStatus,
    /// Non-blocking warnings
    pub warnings: Vec<String>,
}

/// Result of [`Coordinator::batch_merge`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchMergeOutcome {
    /// Hash of the new global commit
    pub global_commit_hash: String,
    /// Number of slices promoted
    pub merged_slice_count: usize,
    /// Ids of the promoted slices, in merge order
    pub merged_slice_ids: Vec<SliceId>,
    /// When the batch merge completed
    pub timestamp: Timestamp,
}

/// The slice/changeset/conflict/global-state coordinator.
pub struct Coordinator {
    durable: DurableStore,
    cache: RwLock<IndexCache>,
    locks: LockTable,
    clock: IdClock,
    watches: WatchManager,
}

impl Coordinator {
    /// Creates a coordinator over the given object store, rehydrating the
    /// index cache from the durable snapshot.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Result<Self> {
        let durable = DurableStore::new(store, prefix);
        let state = durable.load()?;
        let mut cache = IndexCache::new();
        cache.rebuild(&state);
        Ok(Self {
            durable,
            cache: RwLock::new(cache),
            locks: LockTable::new(),
            clock: IdClock::new(),
            watches: WatchManager::new(MAX_PENDING_WATCH_UPDATES),
        })
    }

    fn read_cache(&self) -> Result<RwLockReadGuard<'_, IndexCache>> {
        self.cache
            .read()
            .map_err(|e| CoreError::Internal(e.to_string()))
    }

    fn write_cache(&self) -> Result<RwLockWriteGuard<'_, IndexCache>> {
        self.cache
            .write()
            .map_err(|e| CoreError::Internal(e.to_string()))
    }

    fn publish_conflicts(&self, cache: &IndexCache) {
        self.watches.publish(&cache.conflicts());
    }

    /// Drops all volatile tables and re-materializes them from the durable
    /// snapshot. Safe to run at any time; read results are unchanged.
    pub fn rebuild(&self) -> Result<()> {
        let state = self.durable.load()?;
        let mut cache = self.write_cache()?;
        cache.rebuild(&state);
        Ok(())
    }

    // Slice lifecycle

    /// Creates a slice, stamping timestamps and seeding the file index with
    /// its initial files. `is_root` is reserved for root initialization.
    pub fn create_slice(&self, slice: Slice) -> Result<Slice> {
        if slice.is_root {
            return Err(CoreError::InvalidArgument(
                "is_root may only be set by root slice initialization".to_string(),
            ));
        }
        self.create_slice_record(slice, String::new())
    }

    fn create_slice_record(&self, mut slice: Slice, head_commit_hash: String) -> Result<Slice> {
        if slice.id.is_empty() {
            return Err(CoreError::InvalidArgument("slice id is required".to_string()));
        }

        let now = self.clock.now();
        slice.created_at = now;
        slice.updated_at = now;
        let mut seen = HashSet::new();
        slice.files.retain(|f| seen.insert(f.clone()));

        let meta = SliceMetadata {
            slice_id: slice.id.clone(),
            head_commit_hash,
            modified_files: Vec::new(),
            last_modified: now,
            modified_files_count: 0,
        };

        let mut cache = self.write_cache()?;
        if cache.contains_slice(&slice.id) {
            return Err(CoreError::SliceAlreadyExists(slice.id));
        }
        self.durable.with_state(|state| {
            if state.slices.contains_key(&slice.id) {
                return Err(CoreError::SliceAlreadyExists(slice.id.clone()));
            }
            state.slices.insert(slice.id.clone(), slice.clone());
            state.metadata.insert(slice.id.clone(), meta.clone());
            state.slice_commits.entry(slice.id.clone()).or_default();
            state.slice_changesets.entry(slice.id.clone()).or_default();
            Ok(())
        })?;

        for file in &slice.files {
            cache.index_file(file.clone(), slice.id.clone());
        }
        cache.insert_slice(slice.clone());
        cache.set_metadata(meta);
        self.publish_conflicts(&cache);
        Ok(slice)
    }

    /// Creates the root slice if no slice is marked as root. Idempotent.
    pub fn initialize_root_slice(&self) -> Result<()> {
        if self.read_cache()?.root_slice().is_some() {
            return Ok(());
        }
        let root = Slice {
            id: SliceId::root(),
            name: "Root Slice".to_string(),
            description: "The root slice containing all files".to_string(),
            files: Vec::new(),
            owners: vec!["system".to_string()],
            created_by: "system".to_string(),
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
            parent: None,
            is_root: true,
        };
        match self.create_slice_record(root, "root-initial".to_string()) {
            Ok(_) => Ok(()),
            // Another initializer won the race.
            Err(CoreError::SliceAlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Fetches a slice, falling back to durable storage on a cache miss and
    /// warming the cache.
    pub fn get_slice(&self, id: &SliceId) -> Result<Slice> {
        if id.is_empty() {
            return Err(CoreError::InvalidArgument("slice id is required".to_string()));
        }
        if let Some(slice) = self.read_cache()?.slice(id) {
            return Ok(slice.clone());
        }
        self.warm_slice(id)
    }

    fn warm_slice(&self, id: &SliceId) -> Result<Slice> {
        let state = self.durable.load()?;
        let slice = state
            .slices
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::SliceNotFound(id.clone()))?;
        let mut cache = self.write_cache()?;
        for file in &slice.files {
            cache.index_file(file.clone(), slice.id.clone());
        }
        if let Some(meta) = state.metadata.get(id) {
            cache.set_metadata(meta.clone());
        }
        cache.insert_slice(slice.clone());
        Ok(slice)
    }

    /// Returns the root slice.
    pub fn get_root_slice(&self) -> Result<Slice> {
        self.read_cache()?
            .root_slice()
            .cloned()
            .ok_or_else(|| CoreError::SliceNotFound(SliceId::root()))
    }

    /// Lists slices sorted by id. A limit of 0 means no limit.
    pub fn list_slices(&self, limit: usize, offset: usize) -> Result<Vec<Slice>> {
        let cache = self.read_cache()?;
        let slices: Vec<Slice> = cache
            .slice_ids()
            .iter()
            .filter_map(|id| cache.slice(id).cloned())
            .collect();
        Ok(paginate(slices, limit, offset))
    }

    /// Lists slices owned by the given user, sorted by id.
    pub fn list_slices_by_owner(
        &self,
        owner: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Slice>> {
        let cache = self.read_cache()?;
        let slices: Vec<Slice> = cache
            .slice_ids()
            .iter()
            .filter_map(|id| cache.slice(id))
            .filter(|s| s.owners.iter().any(|o| o == owner))
            .cloned()
            .collect();
        Ok(paginate(slices, limit, offset))
    }

    /// Case-sensitive substring search over slice names and descriptions,
    /// sorted by id.
    pub fn search_slices(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<Slice>> {
        let cache = self.read_cache()?;
        let slices: Vec<Slice> = cache
            .slice_ids()
            .iter()
            .filter_map(|id| cache.slice(id))
            .filter(|s| s.name.contains(query) || s.description.contains(query))
            .cloned()
            .collect();
        Ok(paginate(slices, limit, offset))
    }

    /// Fetches slice metadata with the same durable fallback as `get_slice`.
    pub fn get_slice_metadata(&self, id: &SliceId) -> Result<SliceMetadata> {
        if id.is_empty() {
            return Err(CoreError::InvalidArgument("slice id is required".to_string()));
        }
        if let Some(meta) = self.read_cache()?.metadata(id) {
            return Ok(meta.clone());
        }
        self.warm_slice(id)?;
        self.read_cache()?
            .metadata(id)
            .cloned()
            .ok_or_else(|| CoreError::SliceNotFound(id.clone()))
    }

    /// Replaces slice metadata. An unset `last_modified` is stamped with the
    /// current time; the modified-files count is always recomputed.
    pub fn update_slice_metadata(
        &self,
        id: &SliceId,
        mut meta: SliceMetadata,
    ) -> Result<SliceMetadata> {
        self.get_slice(id)?;
        if meta.last_modified.is_zero() {
            meta.last_modified = self.clock.now();
        }
        meta.slice_id = id.clone();
        meta.modified_files_count = meta.modified_files.len();

        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            if !state.slices.contains_key(id) {
                return Err(CoreError::SliceNotFound(id.clone()));
            }
            state.metadata.insert(id.clone(), meta.clone());
            Ok(())
        })?;
        cache.set_metadata(meta.clone());
        Ok(meta)
    }

    /// Prepends a commit to the slice's history.
    pub fn add_slice_commit(&self, slice_id: &SliceId, commit: Commit) -> Result<()> {
        self.get_slice(slice_id)?;
        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            if !state.slices.contains_key(slice_id) {
                return Err(CoreError::SliceNotFound(slice_id.clone()));
            }
            state
                .slice_commits
                .entry(slice_id.clone())
                .or_default()
                .insert(0, commit.clone());
            Ok(())
        })?;
        cache.push_commit(slice_id, commit);
        Ok(())
    }

    /// Returns the contiguous commit window starting immediately after
    /// `from_commit_hash` (exclusive), newest first. An empty `from` starts
    /// at the head; a limit of 0 returns all remaining commits. An unknown
    /// `from` hash also starts at the head.
    pub fn list_slice_commits(
        &self,
        slice_id: &SliceId,
        limit: usize,
        from_commit_hash: &str,
    ) -> Result<Vec<Commit>> {
        self.get_slice(slice_id)?;
        let cache = self.read_cache()?;
        let commits = cache.commits(slice_id);

        let start = if from_commit_hash.is_empty() {
            0
        } else {
            match commits
                .iter()
                .position(|c| c.commit_hash == from_commit_hash)
            {
                Some(pos) => pos + 1,
                None => 0,
            }
        };
        if start >= commits.len() {
            return Ok(Vec::new());
        }
        let end = if limit == 0 {
            commits.len()
        } else {
            (start + limit).min(commits.len())
        };
        Ok(commits[start..end].to_vec())
    }

    // Changeset lifecycle

    /// Stores a new changeset against an existing slice. Missing id, hash,
    /// and creation time are filled in; status always starts Pending.
    pub fn create_changeset(&self, mut cs: Changeset) -> Result<Changeset> {
        if cs.slice_id.is_empty() {
            return Err(CoreError::InvalidArgument("slice id is required".to_string()));
        }
        self.get_slice(&cs.slice_id)?;

        if cs.id.is_empty() {
            cs.id = ChangesetId::new(self.clock.changeset_id());
        }
        if cs.hash.is_empty() {
            cs.hash = self.clock.changeset_hash();
        }
        cs.status = ChangesetStatus::Pending;
        cs.merged_at = None;
        if cs.created_at.is_zero() {
            cs.created_at = self.clock.now();
        }

        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            if !state.slices.contains_key(&cs.slice_id) {
                return Err(CoreError::SliceNotFound(cs.slice_id.clone()));
            }
            if state.changesets.contains_key(&cs.id) {
                return Err(CoreError::InvalidArgument(format!(
                    "changeset {} already exists",
                    cs.id
                )));
            }
            state.changesets.insert(cs.id.clone(), cs.clone());
            state
                .slice_changesets
                .entry(cs.slice_id.clone())
                .or_default()
                .insert(0, cs.id.clone());
            Ok(())
        })?;
        cache.insert_changeset(cs.clone());
        cache.prepend_slice_changeset(&cs.slice_id, cs.id.clone());
        Ok(cs)
    }

    /// Fetches a changeset, warming the cache from durable on a miss.
    pub fn get_changeset(&self, id: &ChangesetId) -> Result<Changeset> {
        if id.is_empty() {
            return Err(CoreError::InvalidArgument(
                "changeset id is required".to_string(),
            ));
        }
        if let Some(cs) = self.read_cache()?.changeset(id) {
            return Ok(cs.clone());
        }
        let state = self.durable.load()?;
        let cs = state
            .changesets
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::ChangesetNotFound(id.clone()))?;
        self.write_cache()?.insert_changeset(cs.clone());
        Ok(cs)
    }

    /// Lists a slice's changesets newest first, optionally filtered by
    /// status. `None` means no filter; a limit of 0 means no limit.
    pub fn list_changesets(
        &self,
        slice_id: &SliceId,
        status: Option<ChangesetStatus>,
        limit: usize,
    ) -> Result<Vec<Changeset>> {
        let cache = self.read_cache()?;
        let mut result = Vec::new();
        for id in cache.slice_changeset_ids(slice_id) {
            let Some(cs) = cache.changeset(&id) else {
                continue;
            };
            if let Some(filter) = status {
                if cs.status != filter {
                    continue;
                }
            }
            result.push(cs.clone());
            if limit > 0 && result.len() >= limit {
                break;
            }
        }
        Ok(result)
    }

    fn update_changeset(&self, cs: &Changeset) -> Result<()> {
        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            if !state.changesets.contains_key(&cs.id) {
                return Err(CoreError::ChangesetNotFound(cs.id.clone()));
            }
            state.changesets.insert(cs.id.clone(), cs.clone());
            Ok(())
        })?;
        cache.insert_changeset(cs.clone());
        Ok(())
    }

    /// Produces a diff summary and a ReadyForMerge verdict. No state change.
    pub fn review_changeset(&self, id: &ChangesetId) -> Result<ReviewOutcome> {
        let cs = self.get_changeset(id)?;
        let diff = DiffSummary {
            files_added: cs.modified_files.len() as u32,
            files_modified: 0,
            files_deleted: 0,
            lines_added: cs.modified_files.len() as u64,
            lines_removed: 0,
        };
        Ok(ReviewOutcome {
            changeset: cs,
            diff,
            status: ReviewStatus::ReadyForMerge,
            warnings: Vec::new(),
        })
    }

    /// Merges a pending changeset into its slice.
    ///
    /// Any modified file also claimed by another slice aborts with the
    /// conflict list and no state change. The slice and file locks are held
    /// for the whole merge, so concurrent merges sharing a file serialize;
    /// a lock already held by another merge surfaces as ResourceLocked.
    pub fn merge_changeset(&self, id: &ChangesetId) -> Result<MergeOutcome> {
        let cs = self.get_changeset(id)?;
        if matches!(cs.status, ChangesetStatus::Merged | ChangesetStatus::Rejected) {
            return Err(CoreError::FailedPrecondition(format!(
                "changeset {} is already {:?}",
                cs.id, cs.status
            )));
        }
        self.get_slice(&cs.slice_id)?;
        self.locks.lock(&cs.slice_id, &cs.modified_files)?;
        let outcome = self.merge_locked(&cs);
        self.locks.unlock(&cs.slice_id, &cs.modified_files);
        outcome
    }

    fn merge_locked(&self, cs: &Changeset) -> Result<MergeOutcome> {
        let mut cache = self.write_cache()?;

        let mut conflicts = Vec::new();
        for file in &cs.modified_files {
            let conflicting: Vec<SliceId> = cache
                .slices_for_file(file)
                .into_iter()
                .filter(|s| s != &cs.slice_id)
                .collect();
            if !conflicting.is_empty() {
                conflicts.push(FileConflict {
                    file_id: file.clone(),
                    conflicting_slices: conflicting,
                });
            }
        }
        if !conflicts.is_empty() {
            return Ok(MergeOutcome {
                status: MergeStatus::Conflict,
                changeset_id: cs.id.clone(),
                new_commit_hash: String::new(),
                conflicts,
            });
        }

        let new_commit = self.clock.commit_id();
        let now = self.clock.now();
        let mut merged = cs.clone();
        merged.status = ChangesetStatus::Merged;
        merged.merged_at = Some(now);

        let previous_head = cache
            .metadata(&cs.slice_id)
            .map(|m| m.head_commit_hash.clone())
            .unwrap_or_default();
        let meta = SliceMetadata {
            slice_id: cs.slice_id.clone(),
            head_commit_hash: new_commit.clone(),
            modified_files: cs.modified_files.clone(),
            last_modified: now,
            modified_files_count: cs.modified_files.len(),
        };
        let commit = Commit {
            commit_hash: new_commit.clone(),
            parent_hash: previous_head,
            timestamp: now,
            message: cs.message.clone(),
        };

        self.durable.with_state(|state| {
            let slice = state
                .slices
                .get_mut(&cs.slice_id)
                .ok_or_else(|| CoreError::SliceNotFound(cs.slice_id.clone()))?;
            // Fold the claimed files into slice membership so the inverted
            // index stays derivable from membership alone across rebuilds.
            for file in &cs.modified_files {
                if !slice.files.contains(file) {
                    slice.files.push(file.clone());
                }
            }
            state.changesets.insert(merged.id.clone(), merged.clone());
            state.metadata.insert(cs.slice_id.clone(), meta.clone());
            state
                .slice_commits
                .entry(cs.slice_id.clone())
                .or_default()
                .insert(0, commit.clone());
            Ok(())
        })?;

        if let Some(mut slice) = cache.slice(&cs.slice_id).cloned() {
            for file in &cs.modified_files {
                if !slice.files.contains(file) {
                    slice.files.push(file.clone());
                }
                cache.index_file(file.clone(), cs.slice_id.clone());
            }
            cache.insert_slice(slice);
        }
        cache.insert_changeset(merged);
        cache.set_metadata(meta);
        cache.push_commit(&cs.slice_id, commit);

        Ok(MergeOutcome {
            status: MergeStatus::Success,
            changeset_id: cs.id.clone(),
            new_commit_hash: new_commit,
            conflicts: Vec::new(),
        })
    }

    /// Rotates the changeset's base commit to a fresh id.
    ///
    /// Rebase only advertises a new base; conflicts are re-checked by the
    /// next merge attempt, not here.
    pub fn rebase_changeset(&self, id: &ChangesetId) -> Result<RebaseOutcome> {
        let mut cs = self.get_changeset(id)?;
        if matches!(cs.status, ChangesetStatus::Merged | ChangesetStatus::Rejected) {
            return Err(CoreError::FailedPrecondition(format!(
                "changeset {} is already {:?}",
                cs.id, cs.status
            )));
        }
        cs.base_commit_hash = self.clock.rebase_base();
        self.update_changeset(&cs)?;
        Ok(RebaseOutcome {
            changeset_id: cs.id,
            new_base_commit_hash: cs.base_commit_hash,
        })
    }

    // File and conflict management

    /// Adds a file to a slice's membership and the inverted index.
    pub fn add_file_to_slice(&self, file: &FileId, slice_id: &SliceId) -> Result<()> {
        if file.is_empty() {
            return Err(CoreError::InvalidArgument("file id is required".to_string()));
        }
        self.get_slice(slice_id)?;
        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            let slice = state
                .slices
                .get_mut(slice_id)
                .ok_or_else(|| CoreError::SliceNotFound(slice_id.clone()))?;
            if !slice.files.contains(file) {
                slice.files.push(file.clone());
            }
            Ok(())
        })?;
        if let Some(mut slice) = cache.slice(slice_id).cloned() {
            if !slice.files.contains(file) {
                slice.files.push(file.clone());
            }
            cache.insert_slice(slice);
        }
        cache.index_file(file.clone(), slice_id.clone());
        self.publish_conflicts(&cache);
        Ok(())
    }

    /// Removes a file from a slice's membership and the inverted index.
    pub fn remove_file_from_slice(&self, file: &FileId, slice_id: &SliceId) -> Result<()> {
        self.get_slice(slice_id)?;
        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            if let Some(slice) = state.slices.get_mut(slice_id) {
                slice.files.retain(|f| f != file);
            }
            Ok(())
        })?;
        if let Some(mut slice) = cache.slice(slice_id).cloned() {
            slice.files.retain(|f| f != file);
            cache.insert_slice(slice);
        }
        cache.unindex_file(file, slice_id);
        self.publish_conflicts(&cache);
        Ok(())
    }

    /// Slices currently claiming a file, sorted by id.
    pub fn slices_for_file(&self, file: &FileId) -> Result<Vec<SliceId>> {
        Ok(self.read_cache()?.slices_for_file(file))
    }

    /// Every file claimed by two or more slices, sorted by file id.
    pub fn list_conflicts(&self) -> Result<Vec<FileConflict>> {
        Ok(self.read_cache()?.conflicts())
    }

    /// Resolves a conflict by keeping exactly one owner for the file.
    ///
    /// The preferred slice wins when it currently claims the file; otherwise
    /// the sorted-first claimant is kept. Losing slices drop the file from
    /// their membership so the resolution survives a cache rebuild. An
    /// unknown file yields an empty conflict, not an error.
    pub fn resolve_conflict(
        &self,
        file: &FileId,
        preferred: Option<&SliceId>,
    ) -> Result<FileConflict> {
        if file.is_empty() {
            return Err(CoreError::InvalidArgument("file id is required".to_string()));
        }
        let mut cache = self.write_cache()?;
        let claimants = cache.slices_for_file(file);
        if claimants.is_empty() {
            return Ok(FileConflict {
                file_id: file.clone(),
                conflicting_slices: Vec::new(),
            });
        }

        let winner = match preferred {
            Some(p) if claimants.contains(p) => p.clone(),
            _ => claimants[0].clone(),
        };
        let losers: Vec<SliceId> = claimants.into_iter().filter(|s| s != &winner).collect();

        self.durable.with_state(|state| {
            for loser in &losers {
                if let Some(slice) = state.slices.get_mut(loser) {
                    slice.files.retain(|f| f != file);
                }
            }
            Ok(())
        })?;
        for loser in &losers {
            if let Some(mut slice) = cache.slice(loser).cloned() {
                slice.files.retain(|f| f != file);
                cache.insert_slice(slice);
            }
            cache.unindex_file(file, loser);
        }
        self.publish_conflicts(&cache);

        Ok(FileConflict {
            file_id: file.clone(),
            conflicting_slices: vec![winner],
        })
    }

    // Global batch merge

    /// Promotes all (or up to `max_slices`) non-root slices into the root.
    ///
    /// Refuses while any conflict exists; no partial merge. The whole
    /// promotion is computed on a working copy of the durable snapshot and
    /// persisted with one save: either the full root-metadata and history
    /// update lands, or nothing does. A `max_slices` of 0 means no cap.
    /// Slices are merged in sorted id order.
    pub fn batch_merge(&self, max_slices: usize) -> Result<BatchMergeOutcome> {
        // Root initialization persists even if the merge below aborts. It
        // takes the cache lock itself, so it runs before the critical section.
        self.initialize_root_slice()?;

        let mut cache = self.write_cache()?;
        let mut state = self.durable.load()?;

        let conflicts = conflicts_in(&state);
        if !conflicts.is_empty() {
            return Err(CoreError::FailedPrecondition(
                "conflicts present; resolve before merging".to_string(),
            ));
        }

        let root_id = state
            .root_slice()
            .map(|s| s.id.clone())
            .ok_or_else(|| CoreError::Internal("root slice vanished".to_string()))?;

        let mut candidates: Vec<SliceId> = state
            .slices
            .values()
            .filter(|s| !s.is_root)
            .map(|s| s.id.clone())
            .collect();
        if max_slices > 0 && candidates.len() > max_slices {
            candidates.truncate(max_slices);
        }

        let mut merged_files: BTreeSet<FileId> = state
            .metadata
            .get(&root_id)
            .map(|m| m.modified_files.iter().cloned().collect())
            .unwrap_or_default();
        if let Some(root) = state.slices.get(&root_id) {
            merged_files.extend(root.files.iter().cloned());
        }

        let mut merged_slice_ids = Vec::with_capacity(candidates.len());
        for slice_id in &candidates {
            merged_slice_ids.push(slice_id.clone());

            let mut files_to_merge: BTreeSet<FileId> = state
                .slices
                .get(slice_id)
                .map(|s| s.files.iter().cloned().collect())
                .unwrap_or_default();
            if let Some(meta) = state.metadata.get(slice_id) {
                files_to_merge.extend(meta.modified_files.iter().cloned());
            }

            for file in &files_to_merge {
                if let Some(root) = state.slices.get_mut(&root_id) {
                    if !root.files.contains(file) {
                        root.files.push(file.clone());
                    }
                }
                if let Some(slice) = state.slices.get_mut(slice_id) {
                    slice.files.retain(|f| f != file);
                }
                merged_files.insert(file.clone());
            }

            state.metadata.insert(
                slice_id.clone(),
                SliceMetadata {
                    slice_id: slice_id.clone(),
                    head_commit_hash: self.clock.merged_commit_id(slice_id),
                    modified_files: Vec::new(),
                    last_modified: self.clock.now(),
                    modified_files_count: 0,
                },
            );
        }

        let merged_list: Vec<FileId> = merged_files.into_iter().collect();
        let (global_commit_hash, commit_time) = self.clock.global_commit();
        state.metadata.insert(
            root_id.clone(),
            SliceMetadata {
                slice_id: root_id,
                head_commit_hash: global_commit_hash.clone(),
                modified_files: merged_list.clone(),
                last_modified: commit_time,
                modified_files_count: merged_list.len(),
            },
        );

        let mut global = state.global_state.clone().unwrap_or_default();
        global.global_commit_hash = global_commit_hash.clone();
        global.timestamp = commit_time;
        global.history.insert(
            0,
            GlobalCommit {
                commit_hash: global_commit_hash.clone(),
                timestamp: commit_time,
                merged_slice_ids: merged_slice_ids.clone(),
            },
        );
        state.global_state = Some(global);

        self.durable.save(&state)?;
        cache.rebuild(&state);
        self.publish_conflicts(&cache);

        Ok(BatchMergeOutcome {
            global_commit_hash,
            merged_slice_count: merged_slice_ids.len(),
            merged_slice_ids,
            timestamp: commit_time,
        })
    }

    // Global state

    /// Returns the global state snapshot; empty before the first update.
    pub fn get_global_state(&self) -> Result<GlobalState> {
        if let Some(state) = self.read_cache()?.global_state() {
            return Ok(state.clone());
        }
        let state = self.durable.load()?;
        match state.global_state {
            Some(global) => {
                self.write_cache()?.set_global_state(global.clone());
                Ok(global)
            }
            None => Ok(GlobalState::default()),
        }
    }

    /// Merges the incoming global state with the stored one and persists it.
    ///
    /// History keeps incoming entries first, then stored entries whose hash
    /// is not already present; hash and timestamp fall back to the stored
    /// values when unset. The load-merge-save cycle retries on storage
    /// unavailability up to a bounded number of attempts.
    pub fn update_global_state(&self, incoming: GlobalState) -> Result<GlobalState> {
        let mut cache = self.write_cache()?;
        let mut attempts = 0;
        let merged = loop {
            attempts += 1;
            let result = self.durable.load().and_then(|mut state| {
                let merged = merge_global_states(&incoming, state.global_state.as_ref());
                state.global_state = Some(merged.clone());
                self.durable.save(&state)?;
                Ok(merged)
            });
            match result {
                Ok(merged) => break merged,
                Err(CoreError::Unavailable(msg)) if attempts < MAX_GLOBAL_STATE_ATTEMPTS => {
                    warn!(attempt = attempts, error = %msg, "global state write failed, retrying");
                }
                Err(e) => return Err(e),
            }
        };
        cache.set_global_state(merged.clone());
        Ok(merged)
    }

    // Directory entries

    /// Stores a directory entry, indexing it by id and by (parent, path).
    pub fn add_entry(&self, entry: DirectoryEntry) -> Result<()> {
        if entry.id.is_empty() {
            return Err(CoreError::InvalidArgument("entry id is required".to_string()));
        }
        let mut cache = self.write_cache()?;
        if cache.entry(&entry.id).is_some() {
            return Err(CoreError::EntryExists(entry.id));
        }
        self.durable.with_state(|state| {
            if state.entries.contains_key(&entry.id) {
                return Err(CoreError::EntryExists(entry.id.clone()));
            }
            state.entries.insert(entry.id.clone(), entry.clone());
            state
                .entry_paths_by_parent
                .entry(entry.parent_id.clone())
                .or_default()
                .insert(entry.path.clone(), entry.id.clone());
            Ok(())
        })?;
        cache.insert_entry(entry);
        Ok(())
    }

    /// Fetches an entry by id, warming the cache from durable on a miss.
    pub fn get_entry(&self, id: &str) -> Result<DirectoryEntry> {
        if id.is_empty() {
            return Err(CoreError::InvalidArgument("entry id is required".to_string()));
        }
        if let Some(entry) = self.read_cache()?.entry(id) {
            return Ok(entry.clone());
        }
        let state = self.durable.load()?;
        let entry = state
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::EntryNotFound(id.to_string()))?;
        self.write_cache()?.insert_entry(entry.clone());
        Ok(entry)
    }

    /// Resolves an entry by its (parent, path) pair.
    pub fn get_entry_by_path(&self, parent_id: &str, path: &str) -> Result<DirectoryEntry> {
        let cached_id = self.read_cache()?.entry_id_by_path(parent_id, path).cloned();
        let entry_id = match cached_id {
            Some(id) => id,
            None => {
                let state = self.durable.load()?;
                state
                    .entry_paths_by_parent
                    .get(parent_id)
                    .and_then(|paths| paths.get(path))
                    .cloned()
                    .ok_or_else(|| CoreError::EntryNotFound(format!("{parent_id}:{path}")))?
            }
        };
        self.get_entry(&entry_id)
    }

    /// Lists entries under a parent, sorted by entry id.
    pub fn list_entries(&self, parent_id: &str) -> Result<Vec<DirectoryEntry>> {
        let cache = self.read_cache()?;
        Ok(cache
            .entry_ids_by_parent(parent_id)
            .iter()
            .filter_map(|id| cache.entry(id).cloned())
            .collect())
    }

    /// Replaces an existing entry, keeping both indexes coherent.
    pub fn update_entry(&self, entry: DirectoryEntry) -> Result<()> {
        self.get_entry(&entry.id)?;
        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            let old = state
                .entries
                .get(&entry.id)
                .cloned()
                .ok_or_else(|| CoreError::EntryNotFound(entry.id.clone()))?;
            if old.parent_id != entry.parent_id || old.path != entry.path {
                if let Some(paths) = state.entry_paths_by_parent.get_mut(&old.parent_id) {
                    paths.remove(&old.path);
                }
                state
                    .entry_paths_by_parent
                    .entry(entry.parent_id.clone())
                    .or_default()
                    .insert(entry.path.clone(), entry.id.clone());
            }
            state.entries.insert(entry.id.clone(), entry.clone());
            Ok(())
        })?;
        cache.replace_entry(entry);
        Ok(())
    }

    /// Deletes an entry, removing it from both indexes.
    pub fn delete_entry(&self, id: &str) -> Result<()> {
        let entry = self.get_entry(id)?;
        let mut cache = self.write_cache()?;
        self.durable.with_state(|state| {
            state.entries.remove(id);
            if let Some(paths) = state.entry_paths_by_parent.get_mut(&entry.parent_id) {
                paths.remove(&entry.path);
            }
            Ok(())
        })?;
        cache.remove_entry(id);
        Ok(())
    }

    // File content

    /// Writes a file-content blob to the object store.
    pub fn put_file_content(&self, content: FileContent) -> Result<()> {
        if content.file_id.is_empty() {
            return Err(CoreError::InvalidArgument("file id is required".to_string()));
        }
        self.durable.put_file_content(&content)
    }

    /// Content for every file of a slice; files without stored bodies are
    /// skipped.
    pub fn slice_files(&self, slice_id: &SliceId) -> Result<Vec<FileContent>> {
        let slice = self.get_slice(slice_id)?;
        let mut files = Vec::new();
        for file_id in &slice.files {
            if let Some(content) = self.durable.file_content(file_id)? {
                files.push(content);
            }
        }
        Ok(files)
    }

    /// Resolves file content by path through the slice's entry index.
    pub fn slice_file_by_path(&self, slice_id: &SliceId, path: &str) -> Result<FileContent> {
        let entry = self.get_entry_by_path(slice_id.as_str(), path)?;
        Ok(FileContent {
            file_id: FileId::new(entry.id),
            path: entry.path,
            size: entry.size,
            content: entry.content.unwrap_or_default(),
            hash: String::new(),
        })
    }

    // Health and watch

    /// Verifies the object-store round trip and index cache availability.
    pub fn ping(&self) -> Result<()> {
        self.durable.health_probe()?;
        self.read_cache().map(|_| ())
    }

    /// Builds a per-component health report.
    pub fn health_report(&self) -> HealthReport {
        let store = match self.durable.health_probe() {
            Ok(()) => ComponentHealth::healthy("object_store"),
            Err(e) => ComponentHealth::unhealthy("object_store", e.to_string()),
        };
        let cache = match self.read_cache() {
            Ok(_) => ComponentHealth::healthy("index_cache"),
            Err(e) => ComponentHealth::unhealthy("index_cache", e.to_string()),
        };
        HealthReport::from_components(vec![store, cache], self.clock.now())
    }

    /// Registers a conflict watcher, optionally filtered to one slice.
    pub fn subscribe_conflicts(&self, filter: Option<SliceId>) -> u64 {
        self.watches.subscribe(filter)
    }

    /// Drains pending updates for a watcher.
    pub fn drain_conflict_updates(&self, watch_id: u64) -> Vec<ConflictUpdate> {
        self.watches.drain(watch_id)
    }

    /// Removes a conflict watcher.
    pub fn unsubscribe_conflicts(&self, watch_id: u64) -> bool {
        self.watches.unsubscribe(watch_id)
    }
}

fn paginate<T>(items: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    if offset >= items.len() {
        return Vec::new();
    }
    let end = if limit == 0 {
        items.len()
    } else {
        (offset + limit).min(items.len())
    };
    items.into_iter().take(end).skip(offset).collect()
}

/// Recomputes the conflict list from slice membership in a snapshot.
fn conflicts_in(state: &DurableState) -> Vec<FileConflict> {
    let mut index: BTreeMap<FileId, BTreeSet<SliceId>> = BTreeMap::new();
    for (id, slice) in &state.slices {
        for file in &slice.files {
            index.entry(file.clone()).or_default().insert(id.clone());
        }
    }
    index
        .into_iter()
        .filter(|(_, slices)| slices.len() >= 2)
        .map(|(file_id, slices)| FileConflict {
            file_id,
            conflicting_slices: slices.into_iter().collect(),
        })
        .collect()
}

fn merge_global_states(incoming: &GlobalState, current: Option<&GlobalState>) -> GlobalState {
    let mut merged = GlobalState {
        global_commit_hash: incoming.global_commit_hash.clone(),
        timestamp: incoming.timestamp,
        history: Vec::with_capacity(incoming.history.len()),
    };

    let mut seen = HashSet::new();
    for entry in &incoming.history {
        if seen.insert(entry.commit_hash.clone()) {
            merged.history.push(entry.clone());
        }
    }

    if let Some(current) = current {
        for entry in &current.history {
            if seen.insert(entry.commit_hash.clone()) {
                merged.history.push(entry.clone());
            }
        }
        if merged.global_commit_hash.is_empty() {
            merged.global_commit_hash = current.global_commit_hash.clone();
        }
        if merged.timestamp.is_zero() {
            merged.timestamp = current.timestamp;
        }
    }

    merged
}
