//! Services module - business logic layer

pub mod document_service;
pub mod fingerprint;
pub mod lock_manager;
pub mod project_service;
pub mod sweeper;
pub mod sync_service;

pub use document_service::{DocumentService, DocumentSource, UpsertOutcome};
pub use lock_manager::LockManager;
pub use project_service::{ProjectDirectory, ProjectService};
pub use sweeper::spawn_expiry_sweeper;
pub use sync_service::{ContentSource, LocalCheckoutSource, SyncService};
