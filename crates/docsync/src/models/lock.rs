//! Project lock model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Exclusive, time-bounded editing claim on a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLock {
    pub project_id: String,
    pub locked_by: String,
    pub reason: Option<String>,
    pub locked_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProjectLock {
    /// A lock without an expiry never lapses
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Database row for project_locks
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LockRow {
    pub project_id: String,
    pub locked_by: String,
    pub reason: Option<String>,
    pub locked_at: i64,
    pub expires_at: Option<i64>,
}

impl From<LockRow> for ProjectLock {
    fn from(row: LockRow) -> Self {
        Self {
            project_id: row.project_id,
            locked_by: row.locked_by,
            reason: row.reason,
            locked_at: from_millis(row.locked_at),
            expires_at: row.expires_at.map(from_millis),
        }
    }
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Input to `LockStore::try_create`
#[derive(Debug, Clone)]
pub struct NewLock {
    pub project_id: String,
    pub locked_by: String,
    pub reason: Option<String>,
    pub ttl: chrono::Duration,
}

/// Acquire lock request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcquireLockRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    #[serde(default)]
    pub locked_by: String,

    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
}

impl AcquireLockRequest {
    pub fn new(locked_by: impl Into<String>, reason: Option<&str>) -> Self {
        Self {
            locked_by: locked_by.into(),
            reason: reason.map(str::to_string),
        }
    }

    /// Trim both fields; a blank reason is dropped
    pub fn normalized(self) -> Self {
        Self {
            locked_by: self.locked_by.trim().to_string(),
            reason: self
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        }
    }
}

/// Extend lock request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExtendLockRequest {
    #[validate(range(min = 1, max = 120, message = "must be between 1 and 120"))]
    pub minutes: Option<i64>,
}

/// Result of a release; releasing an unlocked project is not an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResult {
    pub released: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReleaseResult {
    pub fn released() -> Self {
        Self {
            released: true,
            message: None,
        }
    }

    pub fn nothing_to_release() -> Self {
        Self {
            released: false,
            message: Some("No lock exists".to_string()),
        }
    }
}

/// Lock state as seen by polling clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Option<ProjectLock>> for LockStatus {
    fn from(lock: Option<ProjectLock>) -> Self {
        match lock {
            Some(lock) => Self {
                locked: true,
                locked_by: Some(lock.locked_by),
                locked_at: Some(lock.locked_at),
                expires_at: lock.expires_at,
            },
            None => Self {
                locked: false,
                locked_by: None,
                locked_at: None,
                expires_at: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_trims_and_drops_blank_reason() {
        let req = AcquireLockRequest::new("  alice  ", Some("   ")).normalized();
        assert_eq!(req.locked_by, "alice");
        assert_eq!(req.reason, None);
    }

    #[test]
    fn test_locked_by_bounds() {
        assert!(AcquireLockRequest::new("", None).validate().is_err());
        assert!(AcquireLockRequest::new("a".repeat(100), None)
            .validate()
            .is_ok());
        assert!(AcquireLockRequest::new("a".repeat(101), None)
            .validate()
            .is_err());
    }

    #[test]
    fn test_reason_bound() {
        let long = "r".repeat(501);
        assert!(AcquireLockRequest::new("alice", Some(&long))
            .validate()
            .is_err());
    }

    #[test]
    fn test_extend_bounds() {
        for ok in [None, Some(1), Some(120)] {
            assert!(ExtendLockRequest { minutes: ok }.validate().is_ok());
        }
        for bad in [Some(0), Some(121), Some(-5)] {
            assert!(ExtendLockRequest { minutes: bad }.validate().is_err());
        }
    }

    #[test]
    fn test_expiry_check() {
        let now = Utc::now();
        let mut lock = ProjectLock {
            project_id: "p".into(),
            locked_by: "alice".into(),
            reason: None,
            locked_at: now,
            expires_at: Some(now - chrono::Duration::seconds(1)),
        };
        assert!(lock.is_expired_at(now));
        lock.expires_at = None;
        assert!(!lock.is_expired_at(now));
    }

    #[test]
    fn test_status_serialization() {
        let status = LockStatus::from(None);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({ "locked": false })
        );
    }
}
