//! SQLite-backed lock store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

use super::{CreateOutcome, LockStore};
use crate::error::{LockError, LockResult};
use crate::models::{LockRow, NewLock, ProjectLock};

const LOCK_COLUMNS: &str = "project_id, locked_by, reason, locked_at, expires_at";

/// Lock store over the `project_locks` table.
///
/// Acquisition runs in a transaction whose first statement is a write, so
/// it holds SQLite's single writer lock before it observes any lock state.
/// That makes the existence check and the insert one indivisible step per
/// database, which is stronger than the per-project guarantee required.
#[derive(Clone)]
pub struct SqliteLockStore {
    pool: SqlitePool,
    transaction_timeout: Duration,
}

impl SqliteLockStore {
    pub fn new(pool: SqlitePool, transaction_timeout: Duration) -> Self {
        Self {
            pool,
            transaction_timeout,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_in_transaction(&self, new_lock: &NewLock) -> LockResult<CreateOutcome> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let expires_ms = (now + new_lock.ttl).timestamp_millis();

        let mut tx = self.pool.begin().await?;

        // Inserts when the project exists and has no lock; replaces a lapsed
        // lock; leaves a live lock alone and returns nothing.
        let created = sqlx::query_as::<_, LockRow>(&format!(
            r#"
            INSERT INTO project_locks ({LOCK_COLUMNS})
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE EXISTS (SELECT 1 FROM projects WHERE id = ?1)
            ON CONFLICT(project_id) DO UPDATE SET
                locked_by = excluded.locked_by,
                reason = excluded.reason,
                locked_at = excluded.locked_at,
                expires_at = excluded.expires_at
            WHERE project_locks.expires_at <= ?4
            RETURNING {LOCK_COLUMNS}
            "#
        ))
        .bind(&new_lock.project_id)
        .bind(&new_lock.locked_by)
        .bind(&new_lock.reason)
        .bind(now_ms)
        .bind(expires_ms)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match created {
            Some(row) => CreateOutcome::Created(row.into()),
            None => {
                let existing = sqlx::query_as::<_, LockRow>(&format!(
                    "SELECT {LOCK_COLUMNS} FROM project_locks WHERE project_id = ?"
                ))
                .bind(&new_lock.project_id)
                .fetch_optional(&mut *tx)
                .await?
                .map(ProjectLock::from);

                match existing {
                    Some(lock) if !lock.is_expired_at(now) => CreateOutcome::Held(lock),
                    _ => CreateOutcome::ProjectMissing,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl LockStore for SqliteLockStore {
    async fn try_create(&self, new_lock: NewLock) -> LockResult<CreateOutcome> {
        // Dropping the transaction on timeout rolls it back
        match tokio::time::timeout(
            self.transaction_timeout,
            self.create_in_transaction(&new_lock),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LockError::Unavailable(format!(
                "lock transaction for project {} timed out after {:?}",
                new_lock.project_id, self.transaction_timeout
            ))),
        }
    }

    async fn get(&self, project_id: &str) -> LockResult<Option<ProjectLock>> {
        let row = sqlx::query_as::<_, LockRow>(&format!(
            "SELECT {LOCK_COLUMNS} FROM project_locks WHERE project_id = ?"
        ))
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProjectLock::from))
    }

    async fn delete(&self, project_id: &str) -> LockResult<bool> {
        let result = sqlx::query("DELETE FROM project_locks WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(
        &self,
        project_id: &str,
        expires_at: DateTime<Utc>,
    ) -> LockResult<Option<ProjectLock>> {
        let now_ms = Utc::now().timestamp_millis();

        let row = sqlx::query_as::<_, LockRow>(&format!(
            r#"
            UPDATE project_locks SET expires_at = ?
            WHERE project_id = ? AND (expires_at IS NULL OR expires_at > ?)
            RETURNING {LOCK_COLUMNS}
            "#
        ))
        .bind(expires_at.timestamp_millis())
        .bind(project_id)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProjectLock::from))
    }

    async fn delete_expired_for(&self, project_id: &str, now: DateTime<Utc>) -> LockResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM project_locks
            WHERE project_id = ? AND expires_at IS NOT NULL AND expires_at <= ?
            "#,
        )
        .bind(project_id)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> LockResult<u64> {
        let result = sqlx::query(
            "DELETE FROM project_locks WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
