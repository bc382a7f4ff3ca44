//! Lock manager - public lock operations and the lazy expiry policy
//!
//! State per project:
//!
//! ```text
//! Unlocked --acquire--> Locked(owner, expiry)
//! Locked   --release--> Unlocked
//! Locked   --extend---> Locked(owner, expiry')
//! Locked   --any read after expiry--> Unlocked
//! Locked   --acquire(other)--> Conflict, state unchanged
//! ```
//!
//! Expiry is lazy: a lapsed lock is removed the next time something reads
//! it, so it can sit in storage until then. `sweep_expired` exists for
//! deployments that want a bound on how long such rows linger.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::LockConfig;
use crate::error::{LockError, LockResult};
use crate::events::LockNotifier;
use crate::models::{AcquireLockRequest, ExtendLockRequest, NewLock, ProjectLock, ReleaseResult};
use crate::store::{CreateOutcome, LockStore};

pub struct LockManager {
    store: Arc<dyn LockStore>,
    notifier: Arc<dyn LockNotifier>,
    config: LockConfig,
}

impl LockManager {
    pub fn new(
        store: Arc<dyn LockStore>,
        notifier: Arc<dyn LockNotifier>,
        config: LockConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire the project lock for the default TTL
    pub async fn acquire(
        &self,
        project_id: &str,
        request: AcquireLockRequest,
    ) -> LockResult<ProjectLock> {
        self.acquire_with_ttl(project_id, request, self.config.default_ttl())
            .await
    }

    /// Acquire the project lock for an explicit TTL.
    ///
    /// Fails with `Conflict` carrying the current holder when an unexpired
    /// lock exists, and `ProjectNotFound` when the project does not.
    pub async fn acquire_with_ttl(
        &self,
        project_id: &str,
        request: AcquireLockRequest,
        ttl: Duration,
    ) -> LockResult<ProjectLock> {
        let request = request.normalized();
        request.validate()?;

        let new_lock = NewLock {
            project_id: project_id.to_string(),
            locked_by: request.locked_by,
            reason: request.reason,
            ttl,
        };

        let mut attempt = 0;
        let outcome = loop {
            match self.store.try_create(new_lock.clone()).await {
                Err(e) if e.is_transient() && attempt < self.config.acquire_retries => {
                    attempt += 1;
                    warn!(project_id, attempt, error = %e, "Lock acquisition hit a transient failure, retrying");
                }
                other => break other?,
            }
        };

        match outcome {
            CreateOutcome::Created(lock) => {
                info!(
                    project_id,
                    locked_by = %lock.locked_by,
                    expires_at = ?lock.expires_at,
                    "Project locked"
                );
                self.notifier
                    .on_lock_acquired(project_id, &lock.locked_by, lock.locked_at);
                Ok(lock)
            }
            CreateOutcome::Held(existing) => {
                debug!(project_id, held_by = %existing.locked_by, "Lock acquisition refused");
                Err(LockError::Conflict {
                    locked_by: existing.locked_by,
                    locked_at: existing.locked_at,
                })
            }
            CreateOutcome::ProjectMissing => Err(LockError::ProjectNotFound(project_id.to_string())),
        }
    }

    /// Release the lock. Releasing an unlocked project reports
    /// `released: false` and is not an error.
    pub async fn release(&self, project_id: &str) -> LockResult<ReleaseResult> {
        if self.get_lock(project_id).await?.is_none() {
            return Ok(ReleaseResult::nothing_to_release());
        }

        if !self.store.delete(project_id).await? {
            return Ok(ReleaseResult::nothing_to_release());
        }

        info!(project_id, "Project unlocked");
        self.notifier.on_lock_released(project_id);
        Ok(ReleaseResult::released())
    }

    /// Push the expiry of a live lock to now + minutes (default TTL when absent)
    pub async fn extend(
        &self,
        project_id: &str,
        request: ExtendLockRequest,
    ) -> LockResult<ProjectLock> {
        request.validate()?;
        let minutes = request
            .minutes
            .unwrap_or_else(|| i64::from(self.config.default_ttl_minutes));
        if minutes > i64::from(self.config.max_extend_minutes) {
            return Err(LockError::invalid(
                "minutes",
                format!("must be at most {}", self.config.max_extend_minutes),
            ));
        }

        if self.get_lock(project_id).await?.is_none() {
            return Err(LockError::NoActiveLock(project_id.to_string()));
        }

        let expires_at = Utc::now() + Duration::minutes(minutes);
        let lock = self
            .store
            .update(project_id, expires_at)
            .await?
            .ok_or_else(|| LockError::NoActiveLock(project_id.to_string()))?;

        info!(project_id, minutes, "Lock extended");
        Ok(lock)
    }

    /// Current live lock, if any. A lapsed lock is deleted and reported as absent.
    pub async fn get_lock(&self, project_id: &str) -> LockResult<Option<ProjectLock>> {
        let now = Utc::now();
        match self.store.get(project_id).await? {
            Some(lock) if lock.is_expired_at(now) => {
                if self.store.delete_expired_for(project_id, now).await? {
                    debug!(project_id, "Removed expired lock");
                    return Ok(None);
                }
                // Someone acquired between the read and the delete
                Ok(self
                    .store
                    .get(project_id)
                    .await?
                    .filter(|lock| !lock.is_expired()))
            }
            other => Ok(other),
        }
    }

    pub async fn is_locked(&self, project_id: &str) -> LockResult<bool> {
        Ok(self.get_lock(project_id).await?.is_some())
    }

    /// Delete every lapsed lock in one pass
    pub async fn sweep_expired(&self) -> LockResult<u64> {
        let removed = self.store.delete_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Swept expired locks");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, NoopNotifier, ProjectEvent};
    use crate::store::SqliteLockStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn manager_with(notifier: Arc<dyn LockNotifier>) -> LockManager {
        let pool = crate::db::connect_in_memory().await.unwrap();
        for id in ["proj-1", "proj-2"] {
            sqlx::query("INSERT INTO projects (id, name) VALUES (?, ?)")
                .bind(id)
                .bind(id)
                .execute(&pool)
                .await
                .unwrap();
        }
        let store = SqliteLockStore::new(pool, std::time::Duration::from_secs(5));
        LockManager::new(Arc::new(store), notifier, LockConfig::default())
    }

    async fn manager() -> LockManager {
        manager_with(Arc::new(NoopNotifier)).await
    }

    fn req(locked_by: &str) -> AcquireLockRequest {
        AcquireLockRequest::new(locked_by, None)
    }

    #[tokio::test]
    async fn test_scenario_a_second_owner_conflicts() {
        let manager = manager().await;

        let lock = manager.acquire("proj-1", req("alice")).await.unwrap();
        assert_eq!(lock.locked_by, "alice");
        let ttl = lock.expires_at.unwrap() - lock.locked_at;
        assert_eq!(ttl.num_minutes(), 30);

        let err = manager.acquire("proj-1", req("bob")).await.unwrap_err();
        match err {
            LockError::Conflict {
                locked_by,
                locked_at,
            } => {
                assert_eq!(locked_by, "alice");
                assert_eq!(locked_at, lock.locked_at);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_same_owner_also_conflicts() {
        let manager = manager().await;
        manager.acquire("proj-1", req("alice")).await.unwrap();
        assert!(matches!(
            manager.acquire("proj-1", req("alice")).await,
            Err(LockError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_scenario_b_release_is_idempotent() {
        let manager = manager().await;
        manager.acquire("proj-1", req("alice")).await.unwrap();

        assert_eq!(
            manager.release("proj-1").await.unwrap(),
            ReleaseResult::released()
        );
        let second = manager.release("proj-1").await.unwrap();
        assert!(!second.released);
        assert!(!manager.is_locked("proj-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_release_never_locked_project() {
        let manager = manager().await;
        assert!(!manager.release("proj-2").await.unwrap().released);
        assert!(!manager.release("missing").await.unwrap().released);
    }

    #[tokio::test]
    async fn test_expired_lock_is_invisible_and_reacquirable() {
        let manager = manager().await;
        manager
            .acquire_with_ttl("proj-1", req("alice"), Duration::milliseconds(1))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(manager.get_lock("proj-1").await.unwrap().is_none());
        assert!(!manager.is_locked("proj-1").await.unwrap());

        let lock = manager.acquire("proj-1", req("bob")).await.unwrap();
        assert_eq!(lock.locked_by, "bob");
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_without_a_read_first() {
        let manager = manager().await;
        manager
            .acquire_with_ttl("proj-1", req("alice"), Duration::milliseconds(1))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let lock = manager.acquire("proj-1", req("bob")).await.unwrap();
        assert_eq!(lock.locked_by, "bob");
    }

    #[tokio::test]
    async fn test_release_of_lapsed_lock_reports_nothing_released() {
        let manager = manager().await;
        manager
            .acquire_with_ttl("proj-1", req("alice"), Duration::milliseconds(1))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(!manager.release("proj-1").await.unwrap().released);
    }

    #[tokio::test]
    async fn test_missing_project_is_not_found() {
        let manager = manager().await;
        assert!(matches!(
            manager.acquire("missing", req("alice")).await,
            Err(LockError::ProjectNotFound(id)) if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_locked_by_bounds() {
        let manager = manager().await;
        let too_long = "x".repeat(101);
        for bad in ["", "   ", too_long.as_str()] {
            match manager.acquire("proj-1", req(bad)).await {
                Err(LockError::Invalid { field, .. }) => assert_eq!(field, "lockedBy"),
                other => panic!("expected Invalid for {bad:?}, got {other:?}"),
            }
        }
        assert!(!manager.is_locked("proj-1").await.unwrap());

        let lock = manager
            .acquire("proj-1", req(&format!("  {}  ", "x".repeat(100))))
            .await
            .unwrap();
        assert_eq!(lock.locked_by.len(), 100);
    }

    #[tokio::test]
    async fn test_reason_is_trimmed_and_bounded() {
        let manager = manager().await;
        let too_long = "r".repeat(501);
        assert!(matches!(
            manager
                .acquire("proj-1", AcquireLockRequest::new("alice", Some(&too_long)))
                .await,
            Err(LockError::Invalid { .. })
        ));

        let lock = manager
            .acquire(
                "proj-1",
                AcquireLockRequest::new("alice", Some("  editing docs ")),
            )
            .await
            .unwrap();
        assert_eq!(lock.reason.as_deref(), Some("editing docs"));
    }

    #[tokio::test]
    async fn test_extend_moves_expiry_only() {
        let manager = manager().await;
        let original = manager.acquire("proj-1", req("alice")).await.unwrap();

        let extended = manager
            .extend("proj-1", ExtendLockRequest { minutes: Some(120) })
            .await
            .unwrap();
        assert_eq!(extended.locked_by, original.locked_by);
        assert_eq!(extended.locked_at, original.locked_at);
        assert!(extended.expires_at.unwrap() > original.expires_at.unwrap());

        let remaining = extended.expires_at.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(119));
    }

    #[tokio::test]
    async fn test_extend_defaults_to_ttl() {
        let manager = manager().await;
        manager.acquire("proj-1", req("alice")).await.unwrap();
        let extended = manager
            .extend("proj-1", ExtendLockRequest::default())
            .await
            .unwrap();
        let remaining = extended.expires_at.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(29));
        assert!(remaining <= Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_extend_requires_live_lock() {
        let manager = manager().await;
        assert!(matches!(
            manager.extend("proj-1", ExtendLockRequest::default()).await,
            Err(LockError::NoActiveLock(_))
        ));

        manager
            .acquire_with_ttl("proj-1", req("alice"), Duration::milliseconds(1))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(matches!(
            manager.extend("proj-1", ExtendLockRequest::default()).await,
            Err(LockError::NoActiveLock(_))
        ));
    }

    #[tokio::test]
    async fn test_extend_bounds() {
        let manager = manager().await;
        manager.acquire("proj-1", req("alice")).await.unwrap();
        for minutes in [0, 121, -1] {
            match manager
                .extend("proj-1", ExtendLockRequest { minutes: Some(minutes) })
                .await
            {
                Err(LockError::Invalid { field, .. }) => assert_eq!(field, "minutes"),
                other => panic!("expected Invalid for {minutes}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_notifications() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let manager = manager_with(Arc::new(bus)).await;

        let lock = manager.acquire("proj-1", req("alice")).await.unwrap();
        let _ = manager.acquire("proj-1", req("bob")).await;
        manager.release("proj-1").await.unwrap();
        manager.release("proj-1").await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ProjectEvent::LockAcquired {
                project_id: "proj-1".into(),
                locked_by: "alice".into(),
                locked_at: lock.locked_at,
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ProjectEvent::LockReleased {
                project_id: "proj-1".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let manager = manager().await;
        manager
            .acquire_with_ttl("proj-1", req("alice"), Duration::milliseconds(1))
            .await
            .unwrap();
        manager.acquire("proj-2", req("bob")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(manager.sweep_expired().await.unwrap(), 1);
        assert!(manager.is_locked("proj-2").await.unwrap());
    }

    /// Fails transiently a fixed number of times before delegating
    struct FlakyStore {
        inner: SqliteLockStore,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl LockStore for FlakyStore {
        async fn try_create(&self, new_lock: NewLock) -> LockResult<CreateOutcome> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(LockError::Unavailable("database is locked".into()));
            }
            self.inner.try_create(new_lock).await
        }
        async fn get(&self, project_id: &str) -> LockResult<Option<ProjectLock>> {
            self.inner.get(project_id).await
        }
        async fn delete(&self, project_id: &str) -> LockResult<bool> {
            self.inner.delete(project_id).await
        }
        async fn update(
            &self,
            project_id: &str,
            expires_at: chrono::DateTime<Utc>,
        ) -> LockResult<Option<ProjectLock>> {
            self.inner.update(project_id, expires_at).await
        }
        async fn delete_expired_for(
            &self,
            project_id: &str,
            now: chrono::DateTime<Utc>,
        ) -> LockResult<bool> {
            self.inner.delete_expired_for(project_id, now).await
        }
        async fn delete_expired(&self, now: chrono::DateTime<Utc>) -> LockResult<u64> {
            self.inner.delete_expired(now).await
        }
    }

    async fn flaky_manager(failures: u32) -> LockManager {
        let pool = crate::db::connect_in_memory().await.unwrap();
        sqlx::query("INSERT INTO projects (id, name) VALUES ('proj-1', 'p')")
            .execute(&pool)
            .await
            .unwrap();
        let store = FlakyStore {
            inner: SqliteLockStore::new(pool, std::time::Duration::from_secs(5)),
            failures_left: AtomicU32::new(failures),
        };
        LockManager::new(Arc::new(store), Arc::new(NoopNotifier), LockConfig::default())
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let manager = flaky_manager(1).await;
        assert!(manager.acquire("proj-1", req("alice")).await.is_ok());
    }

    #[tokio::test]
    async fn test_persistent_failure_surfaces_unavailable() {
        let manager = flaky_manager(2).await;
        let err = manager.acquire("proj-1", req("alice")).await.unwrap_err();
        assert!(matches!(err, LockError::Unavailable(_)));
        assert!(!manager.is_locked("proj-1").await.unwrap());
    }

    /// Lets another owner take over a lapsed lock right after the first read
    struct TakeoverStore {
        inner: SqliteLockStore,
        takeover: std::sync::Mutex<Option<NewLock>>,
    }

    #[async_trait]
    impl LockStore for TakeoverStore {
        async fn try_create(&self, new_lock: NewLock) -> LockResult<CreateOutcome> {
            self.inner.try_create(new_lock).await
        }
        async fn get(&self, project_id: &str) -> LockResult<Option<ProjectLock>> {
            let seen = self.inner.get(project_id).await?;
            let pending = self.takeover.lock().unwrap().take();
            if let Some(new_lock) = pending {
                self.inner.try_create(new_lock).await?;
            }
            Ok(seen)
        }
        async fn delete(&self, project_id: &str) -> LockResult<bool> {
            self.inner.delete(project_id).await
        }
        async fn update(
            &self,
            project_id: &str,
            expires_at: chrono::DateTime<Utc>,
        ) -> LockResult<Option<ProjectLock>> {
            self.inner.update(project_id, expires_at).await
        }
        async fn delete_expired_for(
            &self,
            project_id: &str,
            now: chrono::DateTime<Utc>,
        ) -> LockResult<bool> {
            self.inner.delete_expired_for(project_id, now).await
        }
        async fn delete_expired(&self, now: chrono::DateTime<Utc>) -> LockResult<u64> {
            self.inner.delete_expired(now).await
        }
    }

    #[tokio::test]
    async fn test_lazy_expiry_keeps_lock_taken_over_after_read() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        sqlx::query("INSERT INTO projects (id, name) VALUES ('proj-1', 'p')")
            .execute(&pool)
            .await
            .unwrap();
        let inner = SqliteLockStore::new(pool, std::time::Duration::from_secs(5));
        inner
            .try_create(NewLock {
                project_id: "proj-1".into(),
                locked_by: "alice".into(),
                reason: None,
                ttl: Duration::milliseconds(-1),
            })
            .await
            .unwrap();

        let store = TakeoverStore {
            inner,
            takeover: std::sync::Mutex::new(Some(NewLock {
                project_id: "proj-1".into(),
                locked_by: "bob".into(),
                reason: None,
                ttl: Duration::minutes(30),
            })),
        };
        let manager =
            LockManager::new(Arc::new(store), Arc::new(NoopNotifier), LockConfig::default());

        let seen = manager.get_lock("proj-1").await.unwrap();
        assert_eq!(seen.map(|lock| lock.locked_by), Some("bob".to_string()));

        let held = manager.get_lock("proj-1").await.unwrap().unwrap();
        assert_eq!(held.locked_by, "bob");
        assert!(matches!(
            manager.acquire("proj-1", req("carol")).await,
            Err(LockError::Conflict { locked_by, .. }) if locked_by == "bob"
        ));
    }
}
