//! Admin service: the operator-facing handler group.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use slicevcs_core::health::HealthReport;
use slicevcs_core::types::{FileId, Slice, SliceId, Timestamp};
use slicevcs_core::watch::filter_conflicts;
use slicevcs_core::Coordinator;

use crate::protocol::*;
use crate::status::{ServiceError, ServiceResult};

/// Handlers for batch merge, slice administration, conflicts, and global state.
#[derive(Clone)]
pub struct AdminService {
    coordinator: Arc<Coordinator>,
}

impl AdminService {
    /// Creates the service over a shared coordinator.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Promotes non-root slices into the root, atomically with respect to
    /// conflicts.
    pub async fn batch_merge(&self, req: BatchMergeRequest) -> ServiceResult<BatchMergeResponse> {
        info!(max_slices = req.max_slices, "BatchMerge");
        let outcome = self.coordinator.batch_merge(req.max_slices)?;
        Ok(BatchMergeResponse {
            global_commit_hash: outcome.global_commit_hash,
            merged_slice_count: outcome.merged_slice_count,
            merged_slice_ids: outcome
                .merged_slice_ids
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timestamp: outcome.timestamp,
        })
    }

    /// Creates a new slice.
    pub async fn create_slice(&self, req: CreateSliceRequest) -> ServiceResult<CreateSliceResponse> {
        info!(slice_id = %req.slice_id, name = %req.name, "CreateSlice");
        if req.slice_id.is_empty() {
            return Err(ServiceError::invalid_argument("slice_id is required"));
        }

        let slice = self.coordinator.create_slice(Slice {
            id: SliceId::new(req.slice_id),
            name: req.name,
            description: req.description,
            files: req.files.into_iter().map(FileId::new).collect(),
            owners: req.owners,
            created_by: req.created_by,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
            parent: None,
            is_root: false,
        })?;

        Ok(CreateSliceResponse {
            slice_id: slice.id.to_string(),
            status: "created".to_string(),
        })
    }

    /// Lists slice summaries sorted by id.
    pub async fn list_slices(&self, req: ListSlicesRequest) -> ServiceResult<ListSlicesResponse> {
        info!(limit = req.limit, offset = req.offset, "ListSlices");
        let slices = self.coordinator.list_slices(req.limit, req.offset)?;

        let mut infos = Vec::with_capacity(slices.len());
        for slice in slices {
            let metadata = self.coordinator.get_slice_metadata(&slice.id)?;
            infos.push(SliceInfo {
                slice_id: slice.id.to_string(),
                latest_commit_hash: metadata.head_commit_hash,
                modified_files_count: metadata.modified_files_count,
                last_modified: metadata.last_modified,
            });
        }
        Ok(ListSlicesResponse { slices: infos })
    }

    /// Lists conflicts, optionally restricted to one slice.
    pub async fn get_conflicts(&self, req: ConflictsRequest) -> ServiceResult<ConflictsResponse> {
        info!(slice_id = ?req.slice_id, "GetConflicts");
        let conflicts = self.coordinator.list_conflicts()?;
        let filter = req.slice_id.map(SliceId::new);
        let conflicts = filter_conflicts(&conflicts, filter.as_ref());
        Ok(ConflictsResponse {
            total_conflicts: conflicts.len(),
            conflicts,
        })
    }

    /// Resolves a conflict in favor of one slice.
    pub async fn resolve_conflict(
        &self,
        req: ResolveConflictRequest,
    ) -> ServiceResult<ResolveConflictResponse> {
        info!(file_id = %req.file_id, preferred_slice_id = ?req.preferred_slice_id, "ResolveConflict");
        if req.file_id.is_empty() {
            return Err(ServiceError::invalid_argument("file_id is required"));
        }
        let preferred = req.preferred_slice_id.map(SliceId::new);
        let resolved = self
            .coordinator
            .resolve_conflict(&FileId::new(req.file_id), preferred.as_ref())?;
        Ok(ResolveConflictResponse {
            resolved_conflict: resolved,
        })
    }

    /// Returns the global state, with history if requested.
    pub async fn get_global_state(
        &self,
        req: GlobalStateRequest,
    ) -> ServiceResult<GlobalStateResponse> {
        info!(include_history = req.include_history, "GetGlobalState");
        let state = self.coordinator.get_global_state()?;
        Ok(GlobalStateResponse {
            global_commit_hash: state.global_commit_hash,
            timestamp: state.timestamp,
            history: if req.include_history {
                state.history
            } else {
                Vec::new()
            },
        })
    }

    /// Opens the conflict watch stream.
    ///
    /// The current filtered snapshot is sent as the first emission, then the
    /// channel closes; dropping the receiver cancels the watch.
    pub async fn watch_conflicts(
        &self,
        req: WatchConflictsRequest,
    ) -> ServiceResult<mpsc::Receiver<ConflictUpdate>> {
        info!(slice_id = ?req.slice_id, "WatchConflicts");
        let conflicts = self.coordinator.list_conflicts()?;
        let filter = req.slice_id.map(SliceId::new);
        let snapshot = filter_conflicts(&conflicts, filter.as_ref());

        let (tx, rx) = mpsc::channel(16);
        let _ = tx
            .send(ConflictUpdate {
                new_conflicts: snapshot,
            })
            .await;
        Ok(rx)
    }

    /// Object-store and cache health, per component.
    pub async fn health(&self) -> HealthReport {
        self.coordinator.health_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ErrorCategory;
    use slicevcs_core::objectstore::MemoryObjectStore;

    fn make_service() -> AdminService {
        let coordinator =
            Arc::new(Coordinator::new(Arc::new(MemoryObjectStore::new()), "test").unwrap());
        AdminService::new(coordinator)
    }

    fn create_request(id: &str, files: &[&str]) -> CreateSliceRequest {
        CreateSliceRequest {
            slice_id: id.to_string(),
            name: format!("Slice {id}"),
            description: String::new(),
            files: files.iter().map(|f| f.to_string()).collect(),
            owners: vec!["alice".to_string()],
            created_by: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_slices() {
        let service = make_service();
        service.create_slice(create_request("s1", &["a"])).await.unwrap();
        service.create_slice(create_request("s2", &[])).await.unwrap();

        let listed = service
            .list_slices(ListSlicesRequest { limit: 0, offset: 0 })
            .await
            .unwrap();
        assert_eq!(listed.slices.len(), 2);
        assert_eq!(listed.slices[0].slice_id, "s1");
        assert_eq!(listed.slices[0].latest_commit_hash, "");
    }

    #[tokio::test]
    async fn test_create_slice_validation_and_duplicates() {
        let service = make_service();
        let err = service.create_slice(create_request("", &[])).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::InvalidArgument);

        service.create_slice(create_request("s1", &[])).await.unwrap();
        let err = service.create_slice(create_request("s1", &[])).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::AlreadyExists);
    }

    #[tokio::test]
    async fn test_conflict_listing_and_resolution() {
        let service = make_service();
        service.create_slice(create_request("s1", &["x"])).await.unwrap();
        service.create_slice(create_request("s2", &["x"])).await.unwrap();

        let conflicts = service
            .get_conflicts(ConflictsRequest { slice_id: None })
            .await
            .unwrap();
        assert_eq!(conflicts.total_conflicts, 1);

        // Filtered to an uninvolved slice, the listing is empty.
        let filtered = service
            .get_conflicts(ConflictsRequest {
                slice_id: Some("s3".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(filtered.total_conflicts, 0);

        let resolved = service
            .resolve_conflict(ResolveConflictRequest {
                file_id: "x".to_string(),
                preferred_slice_id: Some("s1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(
            resolved.resolved_conflict.conflicting_slices,
            vec![SliceId::new("s1")]
        );

        let conflicts = service
            .get_conflicts(ConflictsRequest { slice_id: None })
            .await
            .unwrap();
        assert_eq!(conflicts.total_conflicts, 0);
    }

    #[tokio::test]
    async fn test_batch_merge_and_global_state() {
        let service = make_service();
        service.create_slice(create_request("a", &["fa"])).await.unwrap();
        service.create_slice(create_request("b", &["fb"])).await.unwrap();

        let merged = service
            .batch_merge(BatchMergeRequest { max_slices: 0 })
            .await
            .unwrap();
        assert_eq!(merged.merged_slice_count, 2);
        assert_eq!(merged.merged_slice_ids, vec!["a", "b"]);

        let without_history = service
            .get_global_state(GlobalStateRequest {
                include_history: false,
            })
            .await
            .unwrap();
        assert_eq!(without_history.global_commit_hash, merged.global_commit_hash);
        assert!(without_history.history.is_empty());

        let with_history = service
            .get_global_state(GlobalStateRequest {
                include_history: true,
            })
            .await
            .unwrap();
        assert_eq!(with_history.history.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_merge_refused_with_conflicts() {
        let service = make_service();
        service.create_slice(create_request("s1", &["x"])).await.unwrap();
        service.create_slice(create_request("s2", &["x"])).await.unwrap();

        let err = service
            .batch_merge(BatchMergeRequest { max_slices: 0 })
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_watch_conflicts_snapshot_then_close() {
        let service = make_service();
        service.create_slice(create_request("s1", &["x"])).await.unwrap();
        service.create_slice(create_request("s2", &["x"])).await.unwrap();

        let mut rx = service
            .watch_conflicts(WatchConflictsRequest { slice_id: None })
            .await
            .unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.new_conflicts.len(), 1);
        // End of stream after the snapshot.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_health_report() {
        let service = make_service();
        let report = service.health().await;
        assert!(report.is_ok());
    }
}
