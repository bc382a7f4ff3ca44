//! Client-side reconciliation
//!
//! A developer machine keeps the project's documents in a local `.docs/`
//! directory together with the fingerprint they were pulled at. Before a
//! session starts the client asks the platform for the current lock and
//! fingerprint, and pulls everything only when the fingerprints differ.
//!
//! Lock state is advisory. It is reported to the user but never stops the
//! client from reading or refreshing documents, and failing to fetch it is
//! not an error.

mod http;

pub use self::http::HttpPlatformClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::models::{FingerprintResponse, LockStatus, SyncResponse, SyncedDocument};
use crate::security::validate_file_name;

/// Hook endpoints as seen from a client
#[async_trait]
pub trait PlatformApi: Send + Sync {
    async fn lock_status(&self, project_id: &str) -> anyhow::Result<LockStatus>;
    async fn fingerprint(&self, project_id: &str) -> anyhow::Result<FingerprintResponse>;
    async fn full_sync(&self, project_id: &str) -> anyhow::Result<SyncResponse>;
}

const DOCS_DIR: &str = ".docs";
const SYNC_HASH_FILE: &str = ".sync-hash";

/// The `.docs/` directory under a project checkout
#[derive(Debug, Clone)]
pub struct LocalDocsCache {
    dir: PathBuf,
}

impl LocalDocsCache {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: project_dir.as_ref().join(DOCS_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fingerprint of the last successful pull
    pub async fn cached_fingerprint(&self) -> Option<String> {
        let raw = tokio::fs::read_to_string(self.dir.join(SYNC_HASH_FILE))
            .await
            .ok()?;
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Whether at least one markdown document is cached
    pub async fn has_docs(&self) -> bool {
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return false;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("md") {
                return true;
            }
        }
        false
    }

    /// Write every document, then the fingerprint.
    ///
    /// All file names are checked before anything is written, so a rejected
    /// pull leaves the previous cache untouched.
    pub async fn store(
        &self,
        documents: &[SyncedDocument],
        fingerprint: &str,
    ) -> anyhow::Result<Vec<String>> {
        for doc in documents {
            validate_file_name(&doc.file_name)?;
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut written = Vec::with_capacity(documents.len());
        for doc in documents {
            tokio::fs::write(self.dir.join(&doc.file_name), &doc.content).await?;
            written.push(doc.file_name.clone());
        }

        let tmp = self.dir.join(format!("{SYNC_HASH_FILE}.tmp"));
        tokio::fs::write(&tmp, fingerprint).await?;
        tokio::fs::rename(&tmp, self.dir.join(SYNC_HASH_FILE)).await?;

        Ok(written)
    }
}

/// What the client learned about the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockObservation {
    Unlocked,
    Locked {
        locked_by: String,
        locked_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    },
    /// The platform could not be asked
    Unknown { error: String },
}

impl From<LockStatus> for LockObservation {
    fn from(status: LockStatus) -> Self {
        if status.locked {
            LockObservation::Locked {
                locked_by: status.locked_by.unwrap_or_default(),
                locked_at: status.locked_at,
                expires_at: status.expires_at,
            }
        } else {
            LockObservation::Unlocked
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocsOutcome {
    UpToDate {
        fingerprint: String,
    },
    Pulled {
        files: Vec<String>,
        fingerprint: String,
    },
    /// The fingerprint could not be fetched
    Offline {
        error: String,
        has_cached_docs: bool,
    },
    /// The fingerprint differed but the pull did not complete
    PullFailed {
        error: String,
        has_cached_docs: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub lock: LockObservation,
    pub docs: DocsOutcome,
}

impl ReconcileReport {
    /// Whether the session has documentation to work from
    pub fn docs_available(&self) -> bool {
        match &self.docs {
            DocsOutcome::UpToDate { .. } | DocsOutcome::Pulled { .. } => true,
            DocsOutcome::Offline {
                has_cached_docs, ..
            }
            | DocsOutcome::PullFailed {
                has_cached_docs, ..
            } => *has_cached_docs,
        }
    }
}

pub struct Reconciler<A> {
    api: A,
    cache: LocalDocsCache,
}

impl<A: PlatformApi> Reconciler<A> {
    pub fn new(api: A, cache: LocalDocsCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &LocalDocsCache {
        &self.cache
    }

    /// Observe the lock, then bring the local cache up to date if needed
    pub async fn check(&self, project_id: &str) -> ReconcileReport {
        let lock = match self.api.lock_status(project_id).await {
            Ok(status) => status.into(),
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Lock status unavailable");
                LockObservation::Unknown {
                    error: e.to_string(),
                }
            }
        };

        let docs = self.reconcile_docs(project_id).await;
        ReconcileReport { lock, docs }
    }

    async fn reconcile_docs(&self, project_id: &str) -> DocsOutcome {
        let remote = match self.api.fingerprint(project_id).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Fingerprint unavailable, using cached docs");
                return DocsOutcome::Offline {
                    error: e.to_string(),
                    has_cached_docs: self.cache.has_docs().await,
                };
            }
        };

        let cached = self.cache.cached_fingerprint().await;
        if cached.as_deref() == Some(remote.fingerprint.as_str()) {
            tracing::debug!(project_id, "Docs up to date");
            return DocsOutcome::UpToDate {
                fingerprint: remote.fingerprint,
            };
        }

        tracing::info!(
            project_id,
            local = cached.as_deref().unwrap_or("(none)"),
            remote = %remote.fingerprint,
            "Docs outdated, pulling"
        );
        match self.pull(project_id).await {
            Ok((files, fingerprint)) => DocsOutcome::Pulled { files, fingerprint },
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Pull failed");
                DocsOutcome::PullFailed {
                    error: e.to_string(),
                    has_cached_docs: self.cache.has_docs().await,
                }
            }
        }
    }

    async fn pull(&self, project_id: &str) -> anyhow::Result<(Vec<String>, String)> {
        let sync = self.api.full_sync(project_id).await?;
        let files = self.cache.store(&sync.documents, &sync.fingerprint).await?;
        Ok((files, sync.fingerprint))
    }
}
