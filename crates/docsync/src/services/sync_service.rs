//! Sync service - what polling clients see through the hook endpoints
//!
//! Clients poll `fingerprint` and only call `full_sync` when it differs
//! from their cached value. A configured `ContentSource` is consulted on
//! every full sync so the stored documents follow the upstream checkout.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{LockError, LockResult};
use crate::events::{EventBus, ProjectEvent};
use crate::models::{
    FingerprintResponse, LockStatus, Project, RemoteDocument, SyncResponse, SyncedDocument,
};
use crate::security::validate_file_name;
use crate::services::document_service::{DocumentService, DocumentSource};
use crate::services::fingerprint;
use crate::services::lock_manager::LockManager;
use crate::services::project_service::{ProjectDirectory, ProjectService};

/// Upstream documentation content for a project
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, project: &Project) -> LockResult<Vec<RemoteDocument>>;
}

/// Reads `*.md` files from `<root>/<project id>/<docs path>`
#[derive(Debug, Clone)]
pub struct LocalCheckoutSource {
    root: PathBuf,
}

impl LocalCheckoutSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn docs_dir(&self, project: &Project) -> LockResult<PathBuf> {
        let docs_path = Path::new(&project.docs_path);
        if !docs_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(LockError::invalid(
                "docsPath",
                "must be a relative path inside the checkout",
            ));
        }
        Ok(self.root.join(&project.id).join(docs_path))
    }
}

#[async_trait]
impl ContentSource for LocalCheckoutSource {
    async fn fetch(&self, project: &Project) -> LockResult<Vec<RemoteDocument>> {
        let dir = self.docs_dir(project)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(project_id = %project.id, dir = %dir.display(), "No checkout yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            docs.push(RemoteDocument {
                file_name: file_name.to_string(),
                content: tokio::fs::read_to_string(&path).await?,
            });
        }

        docs.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(docs)
    }
}

pub struct SyncService {
    locks: Arc<LockManager>,
    projects: ProjectService,
    documents: DocumentService,
    events: EventBus,
    content_source: Option<Arc<dyn ContentSource>>,
}

impl SyncService {
    pub fn new(
        locks: Arc<LockManager>,
        projects: ProjectService,
        documents: DocumentService,
        events: EventBus,
    ) -> Self {
        Self {
            locks,
            projects,
            documents,
            events,
            content_source: None,
        }
    }

    pub fn with_content_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.content_source = Some(source);
        self
    }

    async fn ensure_project(&self, project_id: &str) -> LockResult<()> {
        if self.projects.project_exists(project_id).await? {
            Ok(())
        } else {
            Err(LockError::ProjectNotFound(project_id.to_string()))
        }
    }

    /// Lock state for polling clients
    pub async fn status(&self, project_id: &str) -> LockResult<LockStatus> {
        self.ensure_project(project_id).await?;
        Ok(self.locks.get_lock(project_id).await?.into())
    }

    pub async fn fingerprint(&self, project_id: &str) -> LockResult<FingerprintResponse> {
        self.ensure_project(project_id).await?;
        let docs = self.documents.list_documents(project_id).await?;
        Ok(FingerprintResponse {
            fingerprint: fingerprint::compute(&docs),
            document_count: docs.len(),
        })
    }

    /// Every document with its content plus the matching fingerprint
    pub async fn full_sync(&self, project_id: &str) -> LockResult<SyncResponse> {
        let project = self.projects.get_project(project_id).await?;

        if let Some(source) = &self.content_source {
            match source.fetch(&project).await {
                Ok(remote) => self.store_remote(project_id, remote).await?,
                Err(e) => {
                    tracing::warn!(project_id, error = %e, "Content refresh failed, serving stored documents");
                }
            }
        }

        let documents: Vec<SyncedDocument> = self
            .documents
            .list_with_content(project_id)
            .await?
            .into_iter()
            .map(SyncedDocument::from)
            .collect();
        let fingerprint = fingerprint::compute_from_hashes(documents.iter().map(|d| &d.hash));

        tracing::info!(project_id, documents = documents.len(), "Full sync served");
        Ok(SyncResponse {
            documents,
            fingerprint,
        })
    }

    async fn store_remote(&self, project_id: &str, remote: Vec<RemoteDocument>) -> LockResult<()> {
        for doc in remote {
            if let Err(e) = validate_file_name(&doc.file_name) {
                tracing::warn!(project_id, file_name = %doc.file_name, error = %e, "Skipping document");
                continue;
            }
            let outcome = self
                .documents
                .upsert(project_id, &doc.file_name, &doc.content)
                .await?;
            if outcome.changed {
                self.events.publish(ProjectEvent::DocUpdated {
                    project_id: project_id.to_string(),
                    file_name: outcome.document.file_name,
                    hash: outcome.document.hash,
                });
            }
        }
        Ok(())
    }
}
