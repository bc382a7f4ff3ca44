//! docsync - project locks and documentation sync
//!
//! Documentation synced from Git repositories is served to developer
//! machines, while at most one person at a time holds a project's lock
//! for editing.
//!
//! # Features
//! - Time-bounded project locks with lazy expiry
//! - Order-independent content fingerprints for cheap staleness checks
//! - Hook endpoints for polling clients, guarded by per-project API keys
//! - A reconciliation client that keeps a local `.docs/` cache current
//! - Lock and document events over server-sent events

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod migrations;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod security;
pub mod services;
pub mod store;

pub use config::LockConfig;
pub use error::{LockError, LockResult};
pub use events::{EventBus, LockNotifier, ProjectEvent};
pub use routes::PlatformState;
pub use services::LockManager;

/// Project an API key was issued for, set by the API key middleware
#[derive(Clone, Debug)]
pub struct AuthenticatedProject(pub String);

impl AuthenticatedProject {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
