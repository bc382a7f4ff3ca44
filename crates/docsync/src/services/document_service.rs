//! Document service - stored documentation content per project

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{LockError, LockResult};
use crate::models::{Document, DocumentHash};
use crate::security::validate_file_name;
use crate::services::fingerprint::content_hash;

/// The document listing a fingerprint is computed over
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_documents(&self, project_id: &str) -> LockResult<Vec<DocumentHash>>;
}

/// Outcome of a document upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub document: Document,
    /// False when the stored content already had the same hash
    pub changed: bool,
}

#[derive(Clone)]
pub struct DocumentService {
    pool: SqlitePool,
}

const DOCUMENT_COLUMNS: &str = "id, project_id, file_name, content, hash, version, updated_at";

impl DocumentService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All documents of a project with their content, ordered by file name
    pub async fn list_with_content(&self, project_id: &str) -> LockResult<Vec<Document>> {
        let docs = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE project_id = ? ORDER BY file_name"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    pub async fn get_document(&self, project_id: &str, file_name: &str) -> LockResult<Document> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE project_id = ? AND file_name = ?"
        ))
        .bind(project_id)
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LockError::DocumentNotFound {
            project_id: project_id.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// Insert or replace a document's content.
    ///
    /// The version is bumped only when the content hash changes.
    pub async fn upsert(
        &self,
        project_id: &str,
        file_name: &str,
        content: &str,
    ) -> LockResult<UpsertOutcome> {
        validate_file_name(file_name)?;
        let hash = content_hash(content);

        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock before reading
        let written = sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents (id, project_id, file_name, content, hash, version, updated_at)
            SELECT ?1, ?2, ?3, ?4, ?5, 1, datetime('now')
            WHERE EXISTS (SELECT 1 FROM projects WHERE id = ?2)
            ON CONFLICT(project_id, file_name) DO UPDATE SET
                content = excluded.content,
                hash = excluded.hash,
                version = documents.version + 1,
                updated_at = excluded.updated_at
            WHERE documents.hash <> excluded.hash
            RETURNING {DOCUMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(project_id)
        .bind(file_name)
        .bind(content)
        .bind(&hash)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match written {
            Some(document) => UpsertOutcome {
                document,
                changed: true,
            },
            None => {
                let existing = sqlx::query_as::<_, Document>(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE project_id = ? AND file_name = ?"
                ))
                .bind(project_id)
                .bind(file_name)
                .fetch_optional(&mut *tx)
                .await?;

                match existing {
                    Some(document) => UpsertOutcome {
                        document,
                        changed: false,
                    },
                    None => return Err(LockError::ProjectNotFound(project_id.to_string())),
                }
            }
        };

        tx.commit().await?;

        if outcome.changed {
            tracing::debug!(
                project_id,
                file_name,
                version = outcome.document.version,
                "Document stored"
            );
        }
        Ok(outcome)
    }
}

#[async_trait]
impl DocumentSource for DocumentService {
    async fn list_documents(&self, project_id: &str) -> LockResult<Vec<DocumentHash>> {
        let docs = sqlx::query_as::<_, DocumentHash>(
            "SELECT file_name, hash FROM documents WHERE project_id = ? ORDER BY file_name",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }
}
