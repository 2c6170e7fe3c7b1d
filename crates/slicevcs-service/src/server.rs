//! HTTP/JSON dispatch layer over the two handler groups.
//!
//! Each route is a thin translation: deserialize, apply the per-call
//! deadline, dispatch to the facade, serialize. Error categories map to
//! HTTP status codes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use slicevcs_core::Coordinator;

use crate::admin::AdminService;
use crate::config::ServerConfig;
use crate::protocol::*;
use crate::slice::SliceService;
use crate::status::{ErrorCategory, ServiceError, ServiceResult};

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    slice: SliceService,
    admin: AdminService,
    deadline: Duration,
}

impl AppState {
    /// Builds the state over a shared coordinator.
    pub fn new(coordinator: Arc<Coordinator>, config: &ServerConfig) -> Self {
        Self {
            slice: SliceService::new(coordinator.clone()),
            admin: AdminService::new(coordinator),
            deadline: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.category.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = ServiceResult<T>>,
) -> ServiceResult<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::new(
            ErrorCategory::Unavailable,
            "request deadline exceeded",
        )),
    }
}

/// Builds the full router over both services.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/slice/checkout", post(checkout_slice))
        .route("/v1/slice/changesets", post(create_changeset))
        .route("/v1/slice/changesets/list", post(list_changesets))
        .route("/v1/slice/changesets/{id}/review", post(review_changeset))
        .route("/v1/slice/changesets/{id}/merge", post(merge_changeset))
        .route("/v1/slice/changesets/{id}/rebase", post(rebase_changeset))
        .route("/v1/slice/commits", post(get_slice_commits))
        .route("/v1/slice/{id}/state", get(get_slice_state))
        .route("/v1/slice/root", get(get_root_slice))
        .route("/v1/slice/from-folder", post(create_slice_from_folder))
        .route("/v1/admin/batch-merge", post(batch_merge))
        .route("/v1/admin/slices", post(create_slice))
        .route("/v1/admin/slices/list", post(list_slices))
        .route("/v1/admin/conflicts/list", post(get_conflicts))
        .route("/v1/admin/conflicts/resolve", post(resolve_conflict))
        .route("/v1/admin/conflicts/watch", post(watch_conflicts))
        .route("/v1/admin/global-state", post(get_global_state))
        .route("/health", get(health))
        .with_state(state)
}

async fn checkout_slice(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.checkout_slice(req))
        .await
        .map(Json)
}

async fn create_changeset(
    State(state): State<AppState>,
    Json(req): Json<CreateChangesetRequest>,
) -> Result<Json<CreateChangesetResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.create_changeset(req))
        .await
        .map(Json)
}

async fn list_changesets(
    State(state): State<AppState>,
    Json(req): Json<ListChangesetsRequest>,
) -> Result<Json<ListChangesetsResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.list_changesets(req))
        .await
        .map(Json)
}

async fn review_changeset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReviewChangesetResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.review_changeset(id))
        .await
        .map(Json)
}

async fn merge_changeset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MergeChangesetResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.merge_changeset(id))
        .await
        .map(Json)
}

async fn rebase_changeset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RebaseChangesetResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.rebase_changeset(id))
        .await
        .map(Json)
}

async fn get_slice_commits(
    State(state): State<AppState>,
    Json(req): Json<CommitHistoryRequest>,
) -> Result<Json<CommitHistoryResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.get_slice_commits(req))
        .await
        .map(Json)
}

async fn get_slice_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StateResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.get_slice_state(id))
        .await
        .map(Json)
}

async fn get_root_slice(
    State(state): State<AppState>,
) -> Result<Json<GetRootSliceResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.get_root_slice())
        .await
        .map(Json)
}

async fn create_slice_from_folder(
    State(state): State<AppState>,
    Json(req): Json<CreateSliceFromFolderRequest>,
) -> Result<Json<CreateSliceFromFolderResponse>, ServiceError> {
    with_deadline(state.deadline, state.slice.create_slice_from_folder(req))
        .await
        .map(Json)
}

async fn batch_merge(
    State(state): State<AppState>,
    Json(req): Json<BatchMergeRequest>,
) -> Result<Json<BatchMergeResponse>, ServiceError> {
    with_deadline(state.deadline, state.admin.batch_merge(req))
        .await
        .map(Json)
}

async fn create_slice(
    State(state): State<AppState>,
    Json(req): Json<CreateSliceRequest>,
) -> Result<Json<CreateSliceResponse>, ServiceError> {
    with_deadline(state.deadline, state.admin.create_slice(req))
        .await
        .map(Json)
}

async fn list_slices(
    State(state): State<AppState>,
    Json(req): Json<ListSlicesRequest>,
) -> Result<Json<ListSlicesResponse>, ServiceError> {
    with_deadline(state.deadline, state.admin.list_slices(req))
        .await
        .map(Json)
}

async fn get_conflicts(
    State(state): State<AppState>,
    Json(req): Json<ConflictsRequest>,
) -> Result<Json<ConflictsResponse>, ServiceError> {
    with_deadline(state.deadline, state.admin.get_conflicts(req))
        .await
        .map(Json)
}

async fn resolve_conflict(
    State(state): State<AppState>,
    Json(req): Json<ResolveConflictRequest>,
) -> Result<Json<ResolveConflictResponse>, ServiceError> {
    with_deadline(state.deadline, state.admin.resolve_conflict(req))
        .await
        .map(Json)
}

/// Drains the watch stream into the response; over plain HTTP the snapshot
/// emission arrives as a one-element array.
async fn watch_conflicts(
    State(state): State<AppState>,
    Json(req): Json<WatchConflictsRequest>,
) -> Result<Json<Vec<ConflictUpdate>>, ServiceError> {
    let mut rx = with_deadline(state.deadline, state.admin.watch_conflicts(req)).await?;
    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }
    Ok(Json(updates))
}

async fn get_global_state(
    State(state): State<AppState>,
    Json(req): Json<GlobalStateRequest>,
) -> Result<Json<GlobalStateResponse>, ServiceError> {
    with_deadline(state.deadline, state.admin.get_global_state(req))
        .await
        .map(Json)
}

async fn health(State(state): State<AppState>) -> Response {
    let report = state.admin.health().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicevcs_core::objectstore::MemoryObjectStore;

    fn make_state() -> AppState {
        let coordinator =
            Arc::new(Coordinator::new(Arc::new(MemoryObjectStore::new()), "test").unwrap());
        AppState::new(coordinator, &ServerConfig::default())
    }

    #[test]
    fn test_router_builds() {
        let _router = router(make_state());
    }

    #[test]
    fn test_service_error_http_response() {
        let err = ServiceError::not_found("slice s1 not found");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let err = ServiceError::new(ErrorCategory::ResourceLocked, "locked");
        assert_eq!(err.into_response().status(), StatusCode::LOCKED);
    }

    #[tokio::test]
    async fn test_with_deadline_passes_result_through() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok::<_, ServiceError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let slow = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ServiceError>(())
        })
        .await;
        assert_eq!(slow.unwrap_err().category, ErrorCategory::Unavailable);
    }
}
