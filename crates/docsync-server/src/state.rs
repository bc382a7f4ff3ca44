//! Application state

use docsync::services::{ContentSource, LocalCheckoutSource};
use docsync::PlatformState;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,

    /// Services behind the `/api` routes
    pub platform: PlatformState,

    /// Server configuration
    pub config: Config,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let content_source = config.docs_checkout_root.as_ref().map(|root| {
            tracing::info!(root = %root, "Refreshing documents from local checkouts");
            Arc::new(LocalCheckoutSource::new(root)) as Arc<dyn ContentSource>
        });
        let platform = PlatformState::new(pool.clone(), config.lock.clone(), content_source);

        Self {
            pool,
            platform,
            config,
        }
    }
}
