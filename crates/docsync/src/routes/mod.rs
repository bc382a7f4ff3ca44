//! Routes module - HTTP API endpoints

pub mod events;
mod extract;
pub mod hook;
pub mod locks;
pub mod projects;

use axum::{middleware, Router};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::require_api_key;
use crate::config::LockConfig;
use crate::events::EventBus;
use crate::services::{ContentSource, DocumentService, LockManager, ProjectService, SyncService};
use crate::store::SqliteLockStore;

pub use extract::ApiJson;

/// Shared state for every platform route
#[derive(Clone)]
pub struct PlatformState {
    pub locks: Arc<LockManager>,
    pub sync: Arc<SyncService>,
    pub documents: DocumentService,
    pub projects: ProjectService,
    pub events: EventBus,
}

impl PlatformState {
    /// Wire the SQLite-backed services over one pool. Lock notifications
    /// are published on the returned state's event bus.
    pub fn new(
        pool: SqlitePool,
        config: LockConfig,
        content_source: Option<Arc<dyn ContentSource>>,
    ) -> Self {
        let events = EventBus::default();
        let store = SqliteLockStore::new(pool.clone(), config.transaction_timeout());
        let locks = Arc::new(LockManager::new(
            Arc::new(store),
            Arc::new(events.clone()),
            config,
        ));
        let projects = ProjectService::new(pool.clone());
        let documents = DocumentService::new(pool);

        let mut sync = SyncService::new(
            locks.clone(),
            projects.clone(),
            documents.clone(),
            events.clone(),
        );
        if let Some(source) = content_source {
            sync = sync.with_content_source(source);
        }

        Self {
            locks,
            sync: Arc::new(sync),
            documents,
            projects,
            events,
        }
    }
}

/// All platform routes, to be nested under `/api`.
/// Hook routes are guarded by the API key middleware.
pub fn router(state: PlatformState) -> Router {
    let hook = hook::routes(state.clone()).route_layer(middleware::from_fn_with_state(
        state.projects.clone(),
        require_api_key,
    ));

    Router::new()
        .merge(locks::routes(state.clone()))
        .merge(projects::routes(state.clone()))
        .merge(events::routes(state))
        .merge(hook)
}
