//! Slice service: the client-facing handler group.

use std::sync::Arc;

use tracing::info;

use slicevcs_core::types::{Changeset, ChangesetId, ChangesetStatus, FileId, SliceId, Timestamp};
use slicevcs_core::Coordinator;

use crate::protocol::*;
use crate::status::{ServiceError, ServiceResult};

/// Handlers for checkout, changesets, commits, and slice state.
#[derive(Clone)]
pub struct SliceService {
    coordinator: Arc<Coordinator>,
}

impl SliceService {
    /// Creates the service over a shared coordinator.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Returns the manifest and available file bodies for a slice.
    pub async fn checkout_slice(&self, req: CheckoutRequest) -> ServiceResult<CheckoutResponse> {
        info!(slice_id = %req.slice_id, commit_hash = %req.commit_hash, "CheckoutSlice");
        if req.slice_id.is_empty() {
            return Err(ServiceError::invalid_argument("slice_id is required"));
        }
        let slice_id = SliceId::new(req.slice_id);

        let metadata = self.coordinator.get_slice_metadata(&slice_id)?;
        let slice = self.coordinator.get_slice(&slice_id)?;
        let stored = self.coordinator.slice_files(&slice_id).unwrap_or_default();

        let mut file_metadata: Vec<FileMetadata> = stored
            .iter()
            .map(|f| FileMetadata {
                file_id: f.file_id.to_string(),
                path: f.path.clone(),
                size: f.size,
                hash: f.hash.clone(),
            })
            .collect();
        // Without stored bodies the manifest is synthesized from membership.
        if file_metadata.is_empty() {
            file_metadata = slice
                .files
                .iter()
                .map(|f| FileMetadata {
                    file_id: f.to_string(),
                    path: f.to_string(),
                    size: 0,
                    hash: String::new(),
                })
                .collect();
        }

        let files = stored
            .into_iter()
            .map(|f| CheckoutFile {
                file_id: f.file_id.to_string(),
                content: f.content,
            })
            .collect();

        Ok(CheckoutResponse {
            manifest: SliceManifest {
                commit_hash: metadata.head_commit_hash,
                file_metadata,
            },
            files,
        })
    }

    /// Streaming checkout; deferred in v1.
    pub async fn stream_checkout_slice(&self, req: CheckoutRequest) -> ServiceResult<()> {
        info!(slice_id = %req.slice_id, "StreamCheckoutSlice");
        Err(ServiceError::internal("streaming checkout not implemented"))
    }

    /// Submits a new changeset against a slice.
    pub async fn create_changeset(
        &self,
        req: CreateChangesetRequest,
    ) -> ServiceResult<CreateChangesetResponse> {
        info!(slice_id = %req.slice_id, author = %req.author, "CreateChangeset");
        if req.slice_id.is_empty() {
            return Err(ServiceError::invalid_argument("slice_id is required"));
        }

        let cs = self.coordinator.create_changeset(Changeset {
            id: ChangesetId::new(""),
            hash: String::new(),
            slice_id: SliceId::new(req.slice_id),
            base_commit_hash: req.base_commit_hash,
            modified_files: req.modified_files.into_iter().map(FileId::new).collect(),
            status: ChangesetStatus::Pending,
            author: req.author,
            message: req.message,
            created_at: Timestamp::ZERO,
            merged_at: None,
        })?;

        Ok(CreateChangesetResponse {
            changeset_id: cs.id.to_string(),
            changeset_hash: cs.hash,
            status: cs.status,
        })
    }

    /// Streaming changeset creation; deferred in v1.
    pub async fn stream_create_changeset(&self) -> ServiceResult<()> {
        info!("StreamCreateChangeset");
        Err(ServiceError::internal(
            "streaming changeset creation not implemented",
        ))
    }

    /// Produces a diff summary and review verdict for a changeset.
    pub async fn review_changeset(
        &self,
        changeset_id: String,
    ) -> ServiceResult<ReviewChangesetResponse> {
        info!(changeset_id = %changeset_id, "ReviewChangeset");
        let review = self
            .coordinator
            .review_changeset(&ChangesetId::new(changeset_id))?;
        Ok(ReviewChangesetResponse {
            changeset: review.changeset,
            diff: review.diff,
            review_status: review.status,
            warnings: review.warnings,
        })
    }

    /// Merges a changeset into its slice, reporting conflicts if any.
    pub async fn merge_changeset(
        &self,
        changeset_id: String,
    ) -> ServiceResult<MergeChangesetResponse> {
        info!(changeset_id = %changeset_id, "MergeChangeset");
        let outcome = self
            .coordinator
            .merge_changeset(&ChangesetId::new(changeset_id))?;
        Ok(MergeChangesetResponse {
            status: outcome.status,
            new_commit_hash: outcome.new_commit_hash,
            changeset_id: outcome.changeset_id.to_string(),
            conflicts: outcome.conflicts,
        })
    }

    /// Rotates a changeset's base commit.
    pub async fn rebase_changeset(
        &self,
        changeset_id: String,
    ) -> ServiceResult<RebaseChangesetResponse> {
        info!(changeset_id = %changeset_id, "RebaseChangeset");
        let outcome = self
            .coordinator
            .rebase_changeset(&ChangesetId::new(changeset_id))?;
        Ok(RebaseChangesetResponse {
            changeset_id: outcome.changeset_id.to_string(),
            new_base_commit_hash: outcome.new_base_commit_hash,
        })
    }

    /// Returns a window of a slice's commit history.
    pub async fn get_slice_commits(
        &self,
        req: CommitHistoryRequest,
    ) -> ServiceResult<CommitHistoryResponse> {
        info!(slice_id = %req.slice_id, limit = req.limit, "GetSliceCommits");
        let commits = self.coordinator.list_slice_commits(
            &SliceId::new(req.slice_id),
            req.limit,
            &req.from_commit_hash,
        )?;
        Ok(CommitHistoryResponse { commits })
    }

    /// Returns the head commit and modified files of a slice.
    pub async fn get_slice_state(&self, slice_id: String) -> ServiceResult<StateResponse> {
        info!(slice_id = %slice_id, "GetSliceState");
        let metadata = self
            .coordinator
            .get_slice_metadata(&SliceId::new(slice_id))?;
        Ok(StateResponse {
            latest_commit_hash: metadata.head_commit_hash,
            modified_files: metadata
                .modified_files
                .iter()
                .map(|f| f.to_string())
                .collect(),
            last_modified: metadata.last_modified,
        })
    }

    /// Lists a slice's changesets, optionally filtered by status.
    pub async fn list_changesets(
        &self,
        req: ListChangesetsRequest,
    ) -> ServiceResult<ListChangesetsResponse> {
        info!(slice_id = %req.slice_id, "ListChangesets");
        let changesets = self.coordinator.list_changesets(
            &SliceId::new(req.slice_id),
            req.status_filter,
            req.limit,
        )?;
        Ok(ListChangesetsResponse { changesets })
    }

    /// Returns the root slice id and head commit.
    pub async fn get_root_slice(&self) -> ServiceResult<GetRootSliceResponse> {
        info!("GetRootSlice");
        let root = self.coordinator.get_root_slice()?;
        let metadata = self.coordinator.get_slice_metadata(&root.id)?;
        Ok(GetRootSliceResponse {
            slice_id: root.id.to_string(),
            commit_hash: metadata.head_commit_hash,
        })
    }

    /// Creates a new slice parented to an existing slice's folder.
    pub async fn create_slice_from_folder(
        &self,
        req: CreateSliceFromFolderRequest,
    ) -> ServiceResult<CreateSliceFromFolderResponse> {
        info!(
            parent_slice_id = %req.parent_slice_id,
            folder_path = %req.folder_path,
            new_slice_id = %req.new_slice_id,
            "CreateSliceFromFolder"
        );
        if req.new_slice_id.is_empty() {
            return Err(ServiceError::invalid_argument("new_slice_id is required"));
        }
        let parent = self
            .coordinator
            .get_slice(&SliceId::new(req.parent_slice_id))?;

        let slice = self.coordinator.create_slice(slicevcs_core::types::Slice {
            id: SliceId::new(req.new_slice_id),
            name: req.name,
            description: req.description,
            files: Vec::new(),
            owners: parent.owners.clone(),
            created_by: "user".to_string(),
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
            parent: Some(parent.id),
            is_root: false,
        })?;

        Ok(CreateSliceFromFolderResponse {
            slice_id: slice.id.to_string(),
            status: "created".to_string(),
            files: Vec::new(),
        })
    }
}
