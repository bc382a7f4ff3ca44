//! Project service - project records and per-project API keys

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{LockError, LockResult};
use crate::models::{ApiKeyInfo, CreateProjectRequest, CreatedApiKey, Project, UpdateProjectRequest};
use crate::security::api_key::{generate_api_key, hash_api_key, key_prefix, validate_key_format};

/// Existence check consumed by the lock and sync paths
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn project_exists(&self, project_id: &str) -> LockResult<bool>;
}

#[derive(Clone)]
pub struct ProjectService {
    pool: SqlitePool,
}

impl ProjectService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_project(&self, request: CreateProjectRequest) -> LockResult<Project> {
        request.validate()?;
        let id = Uuid::new_v4().to_string();

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, name, repo_url, branch, docs_path)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, repo_url, branch, docs_path, created_at
            "#,
        )
        .bind(&id)
        .bind(request.name.trim())
        .bind(&request.repo_url)
        .bind(request.branch.as_deref().unwrap_or("main"))
        .bind(request.docs_path.as_deref().unwrap_or("docs"))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(project_id = %project.id, name = %project.name, "Project created");
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &str) -> LockResult<Project> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, repo_url, branch, docs_path, created_at FROM projects WHERE id = ?",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LockError::ProjectNotFound(project_id.to_string()))
    }

    pub async fn list_projects(&self) -> LockResult<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, repo_url, branch, docs_path, created_at FROM projects
            ORDER BY created_at, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        request: UpdateProjectRequest,
    ) -> LockResult<Project> {
        request.validate()?;

        sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects SET
                name = COALESCE(?, name),
                repo_url = COALESCE(?, repo_url),
                branch = COALESCE(?, branch),
                docs_path = COALESCE(?, docs_path)
            WHERE id = ?
            RETURNING id, name, repo_url, branch, docs_path, created_at
            "#,
        )
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.repo_url)
        .bind(&request.branch)
        .bind(&request.docs_path)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LockError::ProjectNotFound(project_id.to_string()))
    }

    /// Delete a project. Its documents, lock and API keys go with it.
    pub async fn delete_project(&self, project_id: &str) -> LockResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LockError::ProjectNotFound(project_id.to_string()));
        }

        tracing::info!(project_id, "Project deleted");
        Ok(())
    }

    /// Issue a new key for the project. The plaintext is only returned here.
    pub async fn create_api_key(&self, project_id: &str) -> LockResult<CreatedApiKey> {
        if !self.project_exists(project_id).await? {
            return Err(LockError::ProjectNotFound(project_id.to_string()));
        }

        let key = generate_api_key();
        let info = ApiKeyInfo {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            key_prefix: key_prefix(&key),
            is_active: true,
        };

        sqlx::query(
            "INSERT INTO api_keys (id, project_id, key_hash, key_prefix, is_active) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(&info.id)
        .bind(&info.project_id)
        .bind(hash_api_key(&key))
        .bind(&info.key_prefix)
        .execute(&self.pool)
        .await?;

        tracing::info!(project_id, key_prefix = %info.key_prefix, "API key created");
        Ok(CreatedApiKey { info, key })
    }

    /// Resolve an active key to its metadata
    pub async fn verify_api_key(&self, api_key: &str) -> LockResult<Option<ApiKeyInfo>> {
        if !validate_key_format(api_key) {
            return Ok(None);
        }

        let row: Option<(String, String, String, bool)> = sqlx::query_as(
            r#"
            SELECT id, project_id, key_prefix, is_active FROM api_keys
            WHERE key_hash = ? AND is_active = 1
            "#,
        )
        .bind(hash_api_key(api_key))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, project_id, key_prefix, is_active)| ApiKeyInfo {
            id,
            project_id,
            key_prefix,
            is_active,
        }))
    }

    pub async fn list_api_keys(&self, project_id: &str) -> LockResult<Vec<ApiKeyInfo>> {
        if !self.project_exists(project_id).await? {
            return Err(LockError::ProjectNotFound(project_id.to_string()));
        }

        let rows: Vec<(String, String, String, bool)> = sqlx::query_as(
            r#"
            SELECT id, project_id, key_prefix, is_active FROM api_keys
            WHERE project_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, project_id, key_prefix, is_active)| ApiKeyInfo {
                id,
                project_id,
                key_prefix,
                is_active,
            })
            .collect())
    }

    /// Revoke one of the project's keys. False when the project has no such key.
    pub async fn deactivate_api_key(&self, project_id: &str, key_id: &str) -> LockResult<bool> {
        let result = sqlx::query("UPDATE api_keys SET is_active = 0 WHERE id = ? AND project_id = ?")
            .bind(key_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        let revoked = result.rows_affected() > 0;
        if revoked {
            tracing::info!(project_id, key_id, "API key revoked");
        }
        Ok(revoked)
    }
}

#[async_trait]
impl ProjectDirectory for ProjectService {
    async fn project_exists(&self, project_id: &str) -> LockResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> ProjectService {
        ProjectService::new(crate::db::connect_in_memory().await.unwrap())
    }

    fn create_request(name: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            name: name.to_string(),
            repo_url: Some("https://github.com/acme/handbook".to_string()),
            branch: None,
            docs_path: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_project() {
        let service = service().await;
        let project = service.create_project(create_request(" Handbook ")).await.unwrap();
        assert_eq!(project.name, "Handbook");
        assert_eq!(project.branch, "main");
        assert_eq!(project.docs_path, "docs");

        assert_eq!(service.get_project(&project.id).await.unwrap(), project);
        assert!(service.project_exists(&project.id).await.unwrap());
        assert!(!service.project_exists("missing").await.unwrap());
        assert!(matches!(
            service.get_project("missing").await,
            Err(LockError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_empty_name() {
        let service = service().await;
        assert!(matches!(
            service.create_project(create_request("")).await,
            Err(LockError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_api_key_lifecycle() {
        let service = service().await;
        let project = service.create_project(create_request("Handbook")).await.unwrap();

        let created = service.create_api_key(&project.id).await.unwrap();
        let info = service.verify_api_key(&created.key).await.unwrap().unwrap();
        assert_eq!(info.project_id, project.id);
        assert_eq!(info, created.info);

        let other = service.create_project(create_request("Other")).await.unwrap();
        assert!(!service.deactivate_api_key(&other.id, &info.id).await.unwrap());
        assert!(service.verify_api_key(&created.key).await.unwrap().is_some());

        assert!(service.deactivate_api_key(&project.id, &info.id).await.unwrap());
        assert!(service.verify_api_key(&created.key).await.unwrap().is_none());

        let keys = service.list_api_keys(&project.id).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(!keys[0].is_active);
        assert!(service.list_api_keys(&other.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let service = service().await;
        assert!(service
            .verify_api_key("dsk_a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6")
            .await
            .unwrap()
            .is_none());
        assert!(service.verify_api_key("garbage").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_key_for_missing_project() {
        let service = service().await;
        assert!(matches!(
            service.create_api_key("missing").await,
            Err(LockError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_update_projects() {
        let service = service().await;
        let project = service.create_project(create_request("Handbook")).await.unwrap();
        service.create_project(create_request("Runbook")).await.unwrap();
        assert_eq!(service.list_projects().await.unwrap().len(), 2);

        let updated = service
            .update_project(
                &project.id,
                UpdateProjectRequest {
                    name: Some(" Field Guide ".to_string()),
                    branch: Some("develop".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Field Guide");
        assert_eq!(updated.branch, "develop");
        assert_eq!(updated.docs_path, "docs");
        assert_eq!(updated.repo_url, project.repo_url);

        assert!(matches!(
            service
                .update_project("missing", UpdateProjectRequest::default())
                .await,
            Err(LockError::ProjectNotFound(_))
        ));
        assert!(matches!(
            service
                .update_project(
                    &project.id,
                    UpdateProjectRequest {
                        name: Some(String::new()),
                        ..Default::default()
                    },
                )
                .await,
            Err(LockError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        let service = ProjectService::new(pool.clone());
        let project = service.create_project(create_request("Handbook")).await.unwrap();
        let created = service.create_api_key(&project.id).await.unwrap();
        sqlx::query(
            "INSERT INTO project_locks (project_id, locked_by, locked_at, expires_at) VALUES (?, 'alice', 0, NULL)",
        )
        .bind(&project.id)
        .execute(&pool)
        .await
        .unwrap();

        service.delete_project(&project.id).await.unwrap();

        let (locks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM project_locks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(locks, 0);
        assert!(service.verify_api_key(&created.key).await.unwrap().is_none());
        assert!(matches!(
            service.delete_project(&project.id).await,
            Err(LockError::ProjectNotFound(_))
        ));
    }
}
