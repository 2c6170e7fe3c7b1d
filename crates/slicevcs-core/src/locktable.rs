//! Per-slice and per-file mutual exclusion for merges and batch promotion.
//!
//! Lock acquisition is all-or-nothing: if any requested file is held by a
//! different slice, nothing is acquired. Locks live only for the duration of
//! a single coordinator operation and are never persisted; after a crash all
//! in-flight work is simply aborted.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{CoreError, Result};
use crate::types::{FileId, SliceId};

#[derive(Default)]
struct LockTables {
    /// Slices currently checked out for a merge.
    locked_slices: HashSet<SliceId>,
    /// The single slice currently holding each file.
    file_owner: HashMap<FileId, SliceId>,
}

/// In-process registry of slice and file locks.
pub struct LockTable {
    inner: Mutex<LockTables>,
}

impl LockTable {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockTables::default()),
        }
    }

    /// Marks the slice as checked out and takes every file lock, atomically.
    ///
    /// Re-acquisition by the holding slice is a no-op; a file held by any
    /// other slice fails the whole call with [`CoreError::ResourceLocked`]
    /// and leaves the table unchanged.
    pub fn lock(&self, slice: &SliceId, files: &[FileId]) -> Result<()> {
        let mut tables = self
            .inner
            .lock()
            .map_err(|e| CoreError::Internal(e.to_string()))?;

        for file in files {
            if let Some(holder) = tables.file_owner.get(file) {
                if holder != slice {
                    return Err(CoreError::ResourceLocked {
                        file: file.clone(),
                        holder: holder.clone(),
                    });
                }
            }
        }

        tables.locked_slices.insert(slice.clone());
        for file in files {
            tables.file_owner.insert(file.clone(), slice.clone());
        }
        Ok(())
    }

    /// Releases the slice and the given file locks.
    ///
    /// File locks are only released if still owned by the slice; locks taken
    /// over by someone else in the meantime are left alone.
    pub fn unlock(&self, slice: &SliceId, files: &[FileId]) {
        let Ok(mut tables) = self.inner.lock() else {
            return;
        };
        tables.locked_slices.remove(slice);
        for file in files {
            if tables.file_owner.get(file) == Some(slice) {
                tables.file_owner.remove(file);
            }
        }
    }

    /// Returns true if the slice is currently checked out for a merge.
    pub fn is_slice_locked(&self, slice: &SliceId) -> Result<bool> {
        let tables = self
            .inner
            .lock()
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        Ok(tables.locked_slices.contains(slice))
    }

    /// Returns the slice currently holding a file lock, if any.
    pub fn file_holder(&self, file: &FileId) -> Result<Option<SliceId>> {
        let tables = self
            .inner
            .lock()
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        Ok(tables.file_owner.get(file).cloned())
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
