//! Hook routes for polling clients
//!
//! Every handler expects `AuthenticatedProject` from the API key
//! middleware and refuses keys issued for a different project.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};

use super::PlatformState;
use crate::error::{LockError, LockResult};
use crate::models::{FingerprintResponse, LockStatus, SyncResponse};
use crate::AuthenticatedProject;

pub fn routes(state: PlatformState) -> Router {
    Router::new()
        .route("/hook/status/{project_id}", get(get_status))
        .route("/hook/docs/{project_id}", get(get_fingerprint))
        .route("/hook/sync/{project_id}", post(sync_docs))
        .with_state(state)
}

fn ensure_same_project(auth: &AuthenticatedProject, project_id: &str) -> LockResult<()> {
    if auth.as_str() == project_id {
        Ok(())
    } else {
        Err(LockError::Forbidden(
            "API key is not valid for this project".to_string(),
        ))
    }
}

async fn get_status(
    State(state): State<PlatformState>,
    Extension(auth): Extension<AuthenticatedProject>,
    Path(project_id): Path<String>,
) -> LockResult<Json<LockStatus>> {
    ensure_same_project(&auth, &project_id)?;
    Ok(Json(state.sync.status(&project_id).await?))
}

async fn get_fingerprint(
    State(state): State<PlatformState>,
    Extension(auth): Extension<AuthenticatedProject>,
    Path(project_id): Path<String>,
) -> LockResult<Json<FingerprintResponse>> {
    ensure_same_project(&auth, &project_id)?;
    Ok(Json(state.sync.fingerprint(&project_id).await?))
}

async fn sync_docs(
    State(state): State<PlatformState>,
    Extension(auth): Extension<AuthenticatedProject>,
    Path(project_id): Path<String>,
) -> LockResult<Json<SyncResponse>> {
    ensure_same_project(&auth, &project_id)?;
    Ok(Json(state.sync.full_sync(&project_id).await?))
}
