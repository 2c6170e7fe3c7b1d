use thiserror::Error;

use crate::types::{ChangesetId, FileId, SliceId};

/// Error types for coordinator and storage operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// A caller-supplied argument was empty or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested slice does not exist.
    #[error("slice {0} not found")]
    SliceNotFound(SliceId),

    /// A slice with the given id already exists.
    #[error("slice {0} already exists")]
    SliceAlreadyExists(SliceId),

    /// The requested changeset does not exist.
    #[error("changeset {0} not found")]
    ChangesetNotFound(ChangesetId),

    /// The requested directory entry or path does not exist.
    #[error("entry {0} not found")]
    EntryNotFound(String),

    /// A directory entry with the given id already exists.
    #[error("entry {0} already exists")]
    EntryExists(String),

    /// The requested object is absent from the object store.
    #[error("object {0} not found")]
    ObjectMissing(String),

    /// The operation cannot run in the current system state.
    #[error("precondition failed: {0}")]
    FailedPrecondition(String),

    /// A file needed by a merge is held by another merge in flight.
    #[error("file {file} is locked by slice {holder}")]
    ResourceLocked {
        /// The contested file
        file: FileId,
        /// The slice currently holding the lock
        holder: SliceId,
    },

    /// The durable snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The object store is unreachable or retries were exhausted.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// An invariant was violated or a lower layer failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the coordinator crate
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::SliceNotFound(SliceId::new("s1"));
        assert_eq!(format!("{}", err), "slice s1 not found");

        let err = CoreError::ResourceLocked {
            file: FileId::new("f"),
            holder: SliceId::new("s2"),
        };
        assert_eq!(format!("{}", err), "file f is locked by slice s2");
    }

    #[test]
    fn test_changeset_not_found_display() {
        let err = CoreError::ChangesetNotFound(ChangesetId::new("cs-9"));
        assert_eq!(format!("{}", err), "changeset cs-9 not found");
    }
}
