//! Request and response message types for both handler groups.
//!
//! These are the wire shapes of the external surface; record types that
//! already match (changesets, commits, conflicts, global state) are carried
//! through from the coordinator unchanged.

use serde::{Deserialize, Serialize};

use slicevcs_core::coordinator::{DiffSummary, MergeStatus, ReviewStatus};
use slicevcs_core::types::{
    Changeset, ChangesetStatus, Commit, FileConflict, GlobalCommit, Timestamp,
};

// Slice service messages

/// Checkout request for a slice at its current head.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Slice to check out
    pub slice_id: String,
    /// Requested commit; empty means head
    #[serde(default)]
    pub commit_hash: String,
}

/// Per-file metadata in a checkout manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File id
    pub file_id: String,
    /// Repository path
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Content hash; empty when no stored body exists
    pub hash: String,
}

/// Manifest describing a checked-out slice.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SliceManifest {
    /// Head commit of the slice
    pub commit_hash: String,
    /// One entry per file
    pub file_metadata: Vec<FileMetadata>,
}

/// Inline file bytes delivered with a checkout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutFile {
    /// File id
    pub file_id: String,
    /// Raw bytes
    pub content: Vec<u8>,
}

/// Checkout response: manifest plus available file bodies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    /// Slice manifest
    pub manifest: SliceManifest,
    /// File bodies that exist in the object store
    pub files: Vec<CheckoutFile>,
}

/// Changeset submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateChangesetRequest {
    /// Target slice
    pub slice_id: String,
    /// Commit the changeset is based on
    #[serde(default)]
    pub base_commit_hash: String,
    /// Files the changeset modifies
    #[serde(default)]
    pub modified_files: Vec<String>,
    /// Author user id
    #[serde(default)]
    pub author: String,
    /// Submission message
    #[serde(default)]
    pub message: String,
}

/// Response to a changeset submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateChangesetResponse {
    /// Assigned changeset id
    pub changeset_id: String,
    /// Assigned changeset hash
    pub changeset_hash: String,
    /// Initial status (always Pending)
    pub status: ChangesetStatus,
}

/// Review response: the changeset, a diff summary, and a verdict.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewChangesetResponse {
    /// The reviewed changeset
    pub changeset: Changeset,
    /// Summary of the proposed changes
    pub diff: DiffSummary,
    /// Review verdict
    pub review_status: ReviewStatus,
    /// Non-blocking warnings
    pub warnings: Vec<String>,
}

/// Merge response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeChangesetResponse {
    /// Success or Conflict
    pub status: MergeStatus,
    /// New head commit; empty on conflict
    pub new_commit_hash: String,
    /// The merged (or blocked) changeset
    pub changeset_id: String,
    /// Conflicting files; empty on success
    pub conflicts: Vec<FileConflict>,
}

/// Rebase response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebaseChangesetResponse {
    /// The rebased changeset
    pub changeset_id: String,
    /// Freshly minted base commit
    pub new_base_commit_hash: String,
}

/// Commit history request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitHistoryRequest {
    /// Slice whose history to read
    pub slice_id: String,
    /// Maximum commits; 0 means all remaining
    #[serde(default)]
    pub limit: usize,
    /// Start after this hash (exclusive); empty starts at the head
    #[serde(default)]
    pub from_commit_hash: String,
}

/// Commit history response, newest first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitHistoryResponse {
    /// The requested window
    pub commits: Vec<Commit>,
}

/// Slice state response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateResponse {
    /// Head commit of the slice
    pub latest_commit_hash: String,
    /// Files touched by the latest merge
    pub modified_files: Vec<String>,
    /// Last metadata change time
    pub last_modified: Timestamp,
}

/// Changeset listing request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListChangesetsRequest {
    /// Slice whose changesets to list
    pub slice_id: String,
    /// Optional status filter; absent means no filter
    #[serde(default)]
    pub status_filter: Option<ChangesetStatus>,
    /// Maximum results; 0 means all
    #[serde(default)]
    pub limit: usize,
}

/// Changeset listing response, newest first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListChangesetsResponse {
    /// Matching changesets
    pub changesets: Vec<Changeset>,
}

/// Root slice response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetRootSliceResponse {
    /// Root slice id
    pub slice_id: String,
    /// Root head commit
    pub commit_hash: String,
}

/// Request to carve a new slice out of a parent slice's folder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSliceFromFolderRequest {
    /// The parent slice
    pub parent_slice_id: String,
    /// Folder within the parent
    #[serde(default)]
    pub folder_path: String,
    /// Id for the new slice
    pub new_slice_id: String,
    /// Name for the new slice
    #[serde(default)]
    pub name: String,
    /// Description for the new slice
    #[serde(default)]
    pub description: String,
}

/// Response to a create-from-folder request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSliceFromFolderResponse {
    /// The new slice id
    pub slice_id: String,
    /// Creation status string
    pub status: String,
    /// Files seeded into the new slice
    pub files: Vec<String>,
}

// Admin service messages

/// Batch merge request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchMergeRequest {
    /// Maximum slices to promote; 0 means all
    #[serde(default)]
    pub max_slices: usize,
}

/// Batch merge response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchMergeResponse {
    /// Hash of the new global commit
    pub global_commit_hash: String,
    /// Number of slices promoted
    pub merged_slice_count: usize,
    /// Promoted slice ids, in merge order
    pub merged_slice_ids: Vec<String>,
    /// Completion time
    pub timestamp: Timestamp,
}

/// Slice creation request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSliceRequest {
    /// New slice id
    pub slice_id: String,
    /// Name
    #[serde(default)]
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Initial files
    #[serde(default)]
    pub files: Vec<String>,
    /// Owners
    #[serde(default)]
    pub owners: Vec<String>,
    /// Creating user
    #[serde(default)]
    pub created_by: String,
}

/// Slice creation response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSliceResponse {
    /// The created slice id
    pub slice_id: String,
    /// Creation status string
    pub status: String,
}

/// Slice listing request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListSlicesRequest {
    /// Maximum results; 0 means all
    #[serde(default)]
    pub limit: usize,
    /// Results to skip
    #[serde(default)]
    pub offset: usize,
}

/// Summary row in a slice listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SliceInfo {
    /// Slice id
    pub slice_id: String,
    /// Head commit of the slice
    pub latest_commit_hash: String,
    /// Number of files touched by the latest merge
    pub modified_files_count: usize,
    /// Last metadata change time
    pub last_modified: Timestamp,
}

/// Slice listing response, sorted by id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListSlicesResponse {
    /// One row per slice
    pub slices: Vec<SliceInfo>,
}

/// Conflict listing request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConflictsRequest {
    /// Restrict to conflicts involving this slice
    #[serde(default)]
    pub slice_id: Option<String>,
}

/// Conflict listing response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConflictsResponse {
    /// Matching conflicts, sorted by file id
    pub conflicts: Vec<FileConflict>,
    /// Number of matching conflicts
    pub total_conflicts: usize,
}

/// Conflict resolution request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveConflictRequest {
    /// The contested file
    pub file_id: String,
    /// Slice that should keep the file; absent picks the sorted-first claimant
    #[serde(default)]
    pub preferred_slice_id: Option<String>,
}

/// Conflict resolution response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveConflictResponse {
    /// The surviving mapping (at most one slice)
    pub resolved_conflict: FileConflict,
}

/// Global state request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GlobalStateRequest {
    /// Include the full history in the response
    #[serde(default)]
    pub include_history: bool,
}

/// Global state response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalStateResponse {
    /// Latest global commit hash
    pub global_commit_hash: String,
    /// Time of the latest global commit
    pub timestamp: Timestamp,
    /// History, newest first; empty unless requested
    pub history: Vec<GlobalCommit>,
}

/// Watch request for the conflict stream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WatchConflictsRequest {
    /// Restrict to conflicts involving this slice
    #[serde(default)]
    pub slice_id: Option<String>,
}

/// One emission on the conflict watch stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConflictUpdate {
    /// The current (filtered) conflict set
    pub new_conflicts: Vec<FileConflict>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_request_defaults() {
        let req: CheckoutRequest = serde_json::from_str(r#"{"slice_id":"s1"}"#).unwrap();
        assert_eq!(req.slice_id, "s1");
        assert_eq!(req.commit_hash, "");
    }

    #[test]
    fn test_list_changesets_filter_absent_vs_explicit() {
        // Absent filter means "no filter", never the Pending zero value.
        let req: ListChangesetsRequest = serde_json::from_str(r#"{"slice_id":"s1"}"#).unwrap();
        assert!(req.status_filter.is_none());

        let req: ListChangesetsRequest =
            serde_json::from_str(r#"{"slice_id":"s1","status_filter":"pending"}"#).unwrap();
        assert_eq!(req.status_filter, Some(ChangesetStatus::Pending));
    }

    #[test]
    fn test_batch_merge_request_default() {
        let req: BatchMergeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.max_slices, 0);
    }

    #[test]
    fn test_conflicts_request_optional_slice() {
        let req: ConflictsRequest = serde_json::from_str("{}").unwrap();
        assert!(req.slice_id.is_none());
        let req: ConflictsRequest = serde_json::from_str(r#"{"slice_id":"s1"}"#).unwrap();
        assert_eq!(req.slice_id.as_deref(), Some("s1"));
    }
}
