//! Background removal of lapsed locks

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::lock_manager::LockManager;

/// Run `LockManager::sweep_expired` every `interval` until `cancel` fires.
///
/// Sweep failures are logged and the loop keeps going.
pub fn spawn_expiry_sweeper(
    manager: Arc<LockManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Lock sweeper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = manager.sweep_expired().await {
                        tracing::warn!(error = %e, "Lock sweep failed");
                    }
                }
            }
        }
        tracing::info!("Lock sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::events::NoopNotifier;
    use crate::models::AcquireLockRequest;
    use crate::store::{LockStore, SqliteLockStore};

    #[tokio::test]
    async fn test_sweeper_removes_lapsed_locks_and_stops() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        sqlx::query("INSERT INTO projects (id, name) VALUES ('p1', 'Handbook')")
            .execute(&pool)
            .await
            .unwrap();
        let store = Arc::new(SqliteLockStore::new(pool, Duration::from_secs(5)));
        let manager = Arc::new(LockManager::new(
            store.clone(),
            Arc::new(NoopNotifier),
            LockConfig::default(),
        ));

        manager
            .acquire_with_ttl(
                "p1",
                AcquireLockRequest::new("alice", None),
                chrono::Duration::milliseconds(-1),
            )
            .await
            .unwrap();
        assert!(store.get("p1").await.unwrap().is_some());

        let cancel = CancellationToken::new();
        let handle = spawn_expiry_sweeper(manager, Duration::from_millis(20), cancel.clone());

        let mut swept = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if store.get("p1").await.unwrap().is_none() {
                swept = true;
                break;
            }
        }
        assert!(swept);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
