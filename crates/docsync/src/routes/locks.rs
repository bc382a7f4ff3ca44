//! Project lock routes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{ApiJson, PlatformState};
use crate::error::LockResult;
use crate::models::{AcquireLockRequest, ExtendLockRequest, ProjectLock, ReleaseResult};
use crate::security::validate_project_id;

pub fn routes(state: PlatformState) -> Router {
    Router::new()
        .route(
            "/projects/{project_id}/lock",
            get(get_lock).post(acquire_lock).delete(release_lock),
        )
        .route("/projects/{project_id}/lock/extend", post(extend_lock))
        .with_state(state)
}

/// Current lock, or `null` when the project is unlocked
async fn get_lock(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<Json<Option<ProjectLock>>> {
    validate_project_id(&project_id)?;
    Ok(Json(state.locks.get_lock(&project_id).await?))
}

async fn acquire_lock(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
    ApiJson(req): ApiJson<AcquireLockRequest>,
) -> LockResult<(StatusCode, Json<ProjectLock>)> {
    validate_project_id(&project_id)?;
    let lock = state.locks.acquire(&project_id, req).await?;
    Ok((StatusCode::CREATED, Json(lock)))
}

async fn release_lock(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<Json<ReleaseResult>> {
    validate_project_id(&project_id)?;
    Ok(Json(state.locks.release(&project_id).await?))
}

/// An empty body extends by the default TTL
async fn extend_lock(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
    body: Result<Option<Json<ExtendLockRequest>>, JsonRejection>,
) -> LockResult<Json<ProjectLock>> {
    validate_project_id(&project_id)?;
    let req = body?.map(|Json(req)| req).unwrap_or_default();
    Ok(Json(state.locks.extend(&project_id, req).await?))
}
