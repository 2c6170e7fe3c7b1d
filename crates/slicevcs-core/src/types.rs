use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the unique identifier of a slice
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SliceId(String);

impl SliceId {
    /// Creates a new SliceId from a raw string value
    pub fn new(id: impl Into<String>) -> Self {
        SliceId(id.into())
    }

    /// Returns the distinguished root slice id
    pub fn root() -> Self {
        SliceId("root_slice".to_string())
    }

    /// Returns the raw string value of this slice id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents the unique identifier of a file within the repository
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(String);

impl FileId {
    /// Creates a new FileId from a raw string value
    pub fn new(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    /// Returns the raw string value of this file id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents the unique identifier of a changeset
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangesetId(String);

impl ChangesetId {
    /// Creates a new ChangesetId from a raw string value
    pub fn new(id: impl Into<String>) -> Self {
        ChangesetId(id.into())
    }

    /// Returns the raw string value of this changeset id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a point in time with second and nanosecond precision
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since Unix epoch
    pub secs: u64,
    /// Nanoseconds within the second
    pub nanos: u32,
}

impl Timestamp {
    /// The zero timestamp, used as the "unset" sentinel on records
    pub const ZERO: Timestamp = Timestamp { secs: 0, nanos: 0 };

    /// Builds a timestamp from a nanoseconds-since-epoch reading
    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            secs: nanos / 1_000_000_000,
            nanos: (nanos % 1_000_000_000) as u32,
        }
    }

    /// Returns the nanoseconds-since-epoch value of this timestamp
    pub fn as_nanos(&self) -> u64 {
        self.secs * 1_000_000_000 + self.nanos as u64
    }

    /// Returns true if this timestamp is the unset zero value
    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.nanos == 0
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.secs
            .cmp(&other.secs)
            .then_with(|| self.nanos.cmp(&other.nanos))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A named, mutable subset of repository files assigned to a team.
///
/// Exactly one slice in the system is the root slice; it aggregates files
/// promoted by batch merge and is created lazily by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    /// Globally unique, non-empty slice id
    pub id: SliceId,
    /// Human-readable name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Files currently claimed by this slice
    pub files: Vec<FileId>,
    /// User ids allowed to promote changes through this slice
    pub owners: Vec<String>,
    /// User who created the slice
    pub created_by: String,
    /// Creation time, stamped by the coordinator
    pub created_at: Timestamp,
    /// Last update time, stamped by the coordinator
    pub updated_at: Timestamp,
    /// Parent slice when created from a folder of another slice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<SliceId>,
    /// True only for the root slice
    #[serde(default)]
    pub is_root: bool,
}

/// Per-slice head pointer and modified-file summary.
///
/// `modified_files_count == modified_files.len()` is an invariant the
/// coordinator maintains on every write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceMetadata {
    /// The slice this metadata belongs to
    pub slice_id: SliceId,
    /// Head commit hash; empty until the first merge
    pub head_commit_hash: String,
    /// Files touched by the most recent merge into this slice
    pub modified_files: Vec<FileId>,
    /// Time of the last metadata change
    pub last_modified: Timestamp,
    /// Cached length of `modified_files`
    pub modified_files_count: usize,
}

impl SliceMetadata {
    /// Creates empty metadata for a freshly created slice
    pub fn empty(slice_id: SliceId, now: Timestamp) -> Self {
        Self {
            slice_id,
            head_commit_hash: String::new(),
            modified_files: Vec::new(),
            last_modified: now,
            modified_files_count: 0,
        }
    }
}

/// A single commit in a slice's history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Hash of this commit
    pub commit_hash: String,
    /// Hash of the parent commit; empty for the first commit
    pub parent_hash: String,
    /// Commit time
    pub timestamp: Timestamp,
    /// Commit message
    pub message: String,
}

/// Lifecycle state of a changeset.
///
/// Transitions are monotonic: Pending moves to Approved, Rejected or Merged
/// and the record is immutable afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangesetStatus {
    /// Submitted, not yet reviewed or merged
    Pending,
    /// Approved for merge
    Approved,
    /// Rejected; terminal
    Rejected,
    /// Merged into its slice; terminal
    Merged,
}

/// A proposed set of file modifications against a single slice
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Unique changeset id
    pub id: ChangesetId,
    /// Content hash of the changeset
    pub hash: String,
    /// The slice this changeset targets
    pub slice_id: SliceId,
    /// Commit the changeset was based on
    pub base_commit_hash: String,
    /// Files the changeset modifies
    pub modified_files: Vec<FileId>,
    /// Current lifecycle state
    pub status: ChangesetStatus,
    /// Author user id
    pub author: String,
    /// Submission message
    pub message: String,
    /// Submission time
    pub created_at: Timestamp,
    /// Merge time; set exactly when status becomes Merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<Timestamp>,
}

/// A file referenced by two or more slices simultaneously
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConflict {
    /// The contested file
    pub file_id: FileId,
    /// Slices currently claiming the file, sorted by id
    pub conflicting_slices: Vec<SliceId>,
}

/// Kind of a directory entry
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file entry
    File,
    /// Directory entry
    Directory,
}

/// A path-addressed entry used by checkout.
///
/// Entries are indexed twice: by id and by `(parent_id, path)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Unique entry id
    pub id: String,
    /// Path relative to the parent
    pub path: String,
    /// File or directory
    pub kind: EntryKind,
    /// Owning parent (a slice id or another entry id)
    pub parent_id: String,
    /// Inline content for file entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
    /// Content size in bytes
    pub size: u64,
}

/// An entry in the global history recording which slices were promoted together
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCommit {
    /// The global commit hash
    pub commit_hash: String,
    /// When the batch merge completed
    pub timestamp: Timestamp,
    /// Slices promoted in this batch
    pub merged_slice_ids: Vec<SliceId>,
}

/// The current merged view across all slices, newest history entry first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    /// Hash of the latest global commit; empty before the first batch merge
    pub global_commit_hash: String,
    /// Time of the latest global commit
    pub timestamp: Timestamp,
    /// Global commit history, newest first; hashes are unique
    pub history: Vec<GlobalCommit>,
}

/// File bytes plus the metadata a checkout needs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// File id the content belongs to
    pub file_id: FileId,
    /// Repository path of the file
    pub path: String,
    /// Raw bytes
    pub content: Vec<u8>,
    /// Size in bytes
    pub size: u64,
    /// Content hash
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_id_new_and_as_str() {
        let id = SliceId::new("team-a");
        assert_eq!(id.as_str(), "team-a");
        assert!(!id.is_empty());
        assert!(SliceId::new("").is_empty());
    }

    #[test]
    fn test_root_slice_id() {
        assert_eq!(SliceId::root().as_str(), "root_slice");
    }

    #[test]
    fn test_slice_id_display() {
        assert_eq!(format!("{}", SliceId::new("s1")), "s1");
        assert_eq!(format!("{}", FileId::new("f1")), "f1");
        assert_eq!(format!("{}", ChangesetId::new("cs-1")), "cs-1");
    }

    #[test]
    fn test_slice_id_ordering() {
        let a = SliceId::new("a");
        let b = SliceId::new("b");
        assert!(a < b);
        assert_eq!(a, SliceId::new("a"));
    }

    #[test]
    fn test_timestamp_from_nanos_roundtrip() {
        let ts = Timestamp::from_nanos(1_700_000_000_123_456_789);
        assert_eq!(ts.secs, 1_700_000_000);
        assert_eq!(ts.nanos, 123_456_789);
        assert_eq!(ts.as_nanos(), 1_700_000_000_123_456_789);
    }

    #[test]
    fn test_timestamp_ord() {
        let t1 = Timestamp {
            secs: 100,
            nanos: 500,
        };
        let t2 = Timestamp {
            secs: 100,
            nanos: 1000,
        };
        let t3 = Timestamp { secs: 200, nanos: 0 };
        assert!(t1 < t2);
        assert!(t2 < t3);
    }

    #[test]
    fn test_timestamp_zero() {
        assert!(Timestamp::ZERO.is_zero());
        assert!(Timestamp::default().is_zero());
        assert!(!Timestamp::from_nanos(1).is_zero());
    }

    #[test]
    fn test_slice_serde_roundtrip() {
        let slice = Slice {
            id: SliceId::new("s1"),
            name: "Alpha".to_string(),
            description: "first slice".to_string(),
            files: vec![FileId::new("a"), FileId::new("b")],
            owners: vec!["alice".to_string()],
            created_by: "alice".to_string(),
            created_at: Timestamp::from_nanos(42),
            updated_at: Timestamp::from_nanos(43),
            parent: Some(SliceId::root()),
            is_root: false,
        };
        let encoded = serde_json::to_string(&slice).unwrap();
        let decoded: Slice = serde_json::from_str(&encoded).unwrap();
        assert_eq!(slice, decoded);
    }

    #[test]
    fn test_slice_parent_omitted_when_absent() {
        let slice = Slice {
            id: SliceId::new("s1"),
            name: String::new(),
            description: String::new(),
            files: Vec::new(),
            owners: Vec::new(),
            created_by: String::new(),
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
            parent: None,
            is_root: false,
        };
        let encoded = serde_json::to_string(&slice).unwrap();
        assert!(!encoded.contains("parent"));
    }

    #[test]
    fn test_metadata_empty() {
        let meta = SliceMetadata::empty(SliceId::new("s1"), Timestamp::from_nanos(7));
        assert_eq!(meta.head_commit_hash, "");
        assert!(meta.modified_files.is_empty());
        assert_eq!(meta.modified_files_count, 0);
        assert_eq!(meta.last_modified, Timestamp::from_nanos(7));
    }

    #[test]
    fn test_changeset_status_serde() {
        for status in [
            ChangesetStatus::Pending,
            ChangesetStatus::Approved,
            ChangesetStatus::Rejected,
            ChangesetStatus::Merged,
        ] {
            let encoded = serde_json::to_string(&status).unwrap();
            let decoded: ChangesetStatus = serde_json::from_str(&encoded).unwrap();
            assert_eq!(status, decoded);
        }
        assert_eq!(
            serde_json::to_string(&ChangesetStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn test_changeset_serde_roundtrip() {
        let cs = Changeset {
            id: ChangesetId::new("cs-1"),
            hash: "hash-1".to_string(),
            slice_id: SliceId::new("s1"),
            base_commit_hash: "base".to_string(),
            modified_files: vec![FileId::new("f")],
            status: ChangesetStatus::Merged,
            author: "alice".to_string(),
            message: "msg".to_string(),
            created_at: Timestamp::from_nanos(1),
            merged_at: Some(Timestamp::from_nanos(2)),
        };
        let encoded = serde_json::to_string(&cs).unwrap();
        let decoded: Changeset = serde_json::from_str(&encoded).unwrap();
        assert_eq!(cs, decoded);
    }

    #[test]
    fn test_global_state_default() {
        let state = GlobalState::default();
        assert_eq!(state.global_commit_hash, "");
        assert!(state.timestamp.is_zero());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_entry_kind_serde() {
        assert_eq!(serde_json::to_string(&EntryKind::File).unwrap(), "\"file\"");
        assert_eq!(
            serde_json::to_string(&EntryKind::Directory).unwrap(),
            "\"directory\""
        );
    }
}
