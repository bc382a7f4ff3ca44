//! Project event notifications
//!
//! Lock operations report what happened through `LockNotifier`. Delivery is
//! fire-and-forget: a notifier must return immediately and must not fail
//! the lock operation that triggered it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events pushed to watchers of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ProjectEvent {
    #[serde(rename = "lock:acquired", rename_all = "camelCase")]
    LockAcquired {
        project_id: String,
        locked_by: String,
        locked_at: DateTime<Utc>,
    },
    #[serde(rename = "lock:released", rename_all = "camelCase")]
    LockReleased { project_id: String },
    #[serde(rename = "doc:updated", rename_all = "camelCase")]
    DocUpdated {
        project_id: String,
        file_name: String,
        hash: String,
    },
}

impl ProjectEvent {
    pub fn project_id(&self) -> &str {
        match self {
            ProjectEvent::LockAcquired { project_id, .. }
            | ProjectEvent::LockReleased { project_id }
            | ProjectEvent::DocUpdated { project_id, .. } => project_id,
        }
    }

    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            ProjectEvent::LockAcquired { .. } => "lock:acquired",
            ProjectEvent::LockReleased { .. } => "lock:released",
            ProjectEvent::DocUpdated { .. } => "doc:updated",
        }
    }
}

/// Sink for lock lifecycle notifications
pub trait LockNotifier: Send + Sync {
    fn on_lock_acquired(&self, project_id: &str, locked_by: &str, locked_at: DateTime<Utc>);
    fn on_lock_released(&self, project_id: &str);
}

/// Discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl LockNotifier for NoopNotifier {
    fn on_lock_acquired(&self, _project_id: &str, _locked_by: &str, _locked_at: DateTime<Utc>) {}
    fn on_lock_released(&self, _project_id: &str) {}
}

/// In-process broadcast of project events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ProjectEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ProjectEvent) {
        let project_id = event.project_id().to_string();
        let kind = event.event_type();
        // No receivers is the normal idle state
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(project_id, kind, receivers, "Event broadcast");
            }
            Err(_) => {
                tracing::trace!(project_id, kind, "Event dropped, no subscribers");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LockNotifier for EventBus {
    fn on_lock_acquired(&self, project_id: &str, locked_by: &str, locked_at: DateTime<Utc>) {
        self.publish(ProjectEvent::LockAcquired {
            project_id: project_id.to_string(),
            locked_by: locked_by.to_string(),
            locked_at,
        });
    }

    fn on_lock_released(&self, project_id: &str) {
        self.publish(ProjectEvent::LockReleased {
            project_id: project_id.to_string(),
        });
    }
}
