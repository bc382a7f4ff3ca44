//! Lock persistence
//!
//! A `LockStore` keeps at most one lock row per project and makes the
//! check-and-create step of acquisition atomic. It never interprets expiry
//! on plain reads; that policy belongs to `LockManager`.

mod sqlite;

pub use sqlite::SqliteLockStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LockResult;
use crate::models::{NewLock, ProjectLock};

/// Outcome of `LockStore::try_create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The lock was written; any lapsed predecessor was replaced
    Created(ProjectLock),
    /// An unexpired lock already exists and was left untouched
    Held(ProjectLock),
    /// The referenced project does not exist
    ProjectMissing,
}

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically create a lock unless an unexpired one exists.
    ///
    /// Two concurrent callers for the same project never both get `Created`.
    async fn try_create(&self, new_lock: NewLock) -> LockResult<CreateOutcome>;

    /// Raw read, expired or not
    async fn get(&self, project_id: &str) -> LockResult<Option<ProjectLock>>;

    /// True if a row existed and was removed
    async fn delete(&self, project_id: &str) -> LockResult<bool>;

    /// Move the expiry of a still-live lock; None if there is none
    async fn update(
        &self,
        project_id: &str,
        expires_at: DateTime<Utc>,
    ) -> LockResult<Option<ProjectLock>>;

    /// Remove the project's lock only if it lapsed at or before `now`.
    ///
    /// A lock that was replaced by a live one in the meantime is kept.
    async fn delete_expired_for(&self, project_id: &str, now: DateTime<Utc>) -> LockResult<bool>;

    /// Remove every lock that lapsed at or before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> LockResult<u64>;
}
