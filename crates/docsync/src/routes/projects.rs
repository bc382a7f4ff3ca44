//! Project, document and API key routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use validator::Validate;

use super::{ApiJson, PlatformState};
use crate::error::{LockError, LockResult};
use crate::events::ProjectEvent;
use crate::models::{
    ApiKeyInfo, CreateProjectRequest, CreatedApiKey, Document, Project, UpdateDocumentRequest,
    UpdateProjectRequest,
};
use crate::security::validate_project_id;

pub fn routes(state: PlatformState) -> Router {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/{project_id}/documents", get(list_documents))
        .route(
            "/projects/{project_id}/documents/{file_name}",
            put(upsert_document).get(get_document),
        )
        .route(
            "/projects/{project_id}/api-keys",
            get(list_api_keys).post(create_api_key),
        )
        .route(
            "/projects/{project_id}/api-keys/{key_id}",
            delete(revoke_api_key),
        )
        .with_state(state)
}

async fn list_projects(State(state): State<PlatformState>) -> LockResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.list_projects().await?))
}

async fn create_project(
    State(state): State<PlatformState>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> LockResult<(StatusCode, Json<Project>)> {
    let project = state.projects.create_project(req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<Json<Project>> {
    validate_project_id(&project_id)?;
    Ok(Json(state.projects.get_project(&project_id).await?))
}

async fn update_project(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> LockResult<Json<Project>> {
    validate_project_id(&project_id)?;
    Ok(Json(state.projects.update_project(&project_id, req).await?))
}

/// Deleting a locked project releases its lock
async fn delete_project(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<StatusCode> {
    validate_project_id(&project_id)?;
    let was_locked = state.locks.is_locked(&project_id).await?;
    state.projects.delete_project(&project_id).await?;

    if was_locked {
        state.events.publish(ProjectEvent::LockReleased {
            project_id: project_id.clone(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_documents(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<Json<Vec<Document>>> {
    validate_project_id(&project_id)?;
    state.projects.get_project(&project_id).await?;
    Ok(Json(state.documents.list_with_content(&project_id).await?))
}

async fn get_document(
    State(state): State<PlatformState>,
    Path((project_id, file_name)): Path<(String, String)>,
) -> LockResult<Json<Document>> {
    validate_project_id(&project_id)?;
    Ok(Json(
        state.documents.get_document(&project_id, &file_name).await?,
    ))
}

async fn upsert_document(
    State(state): State<PlatformState>,
    Path((project_id, file_name)): Path<(String, String)>,
    ApiJson(req): ApiJson<UpdateDocumentRequest>,
) -> LockResult<Json<Document>> {
    validate_project_id(&project_id)?;
    req.validate()?;
    let outcome = state
        .documents
        .upsert(&project_id, &file_name, &req.content)
        .await?;

    if outcome.changed {
        state.events.publish(ProjectEvent::DocUpdated {
            project_id: project_id.clone(),
            file_name: outcome.document.file_name.clone(),
            hash: outcome.document.hash.clone(),
        });
    }
    Ok(Json(outcome.document))
}

async fn list_api_keys(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<Json<Vec<ApiKeyInfo>>> {
    validate_project_id(&project_id)?;
    Ok(Json(state.projects.list_api_keys(&project_id).await?))
}

/// The plaintext key is only part of this response
async fn create_api_key(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<(StatusCode, Json<CreatedApiKey>)> {
    validate_project_id(&project_id)?;
    let key = state.projects.create_api_key(&project_id).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

async fn revoke_api_key(
    State(state): State<PlatformState>,
    Path((project_id, key_id)): Path<(String, String)>,
) -> LockResult<StatusCode> {
    validate_project_id(&project_id)?;
    if !state.projects.deactivate_api_key(&project_id, &key_id).await? {
        return Err(LockError::ApiKeyNotFound(key_id));
    }
    Ok(StatusCode::NO_CONTENT)
}
