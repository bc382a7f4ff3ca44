//! Lock subsystem configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LockError, LockResult};

/// Lock feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lifetime of a freshly acquired lock, and the default extension
    #[serde(default = "default_ttl_minutes")]
    pub default_ttl_minutes: u32,

    /// Upper bound accepted by extend
    #[serde(default = "default_max_extend_minutes")]
    pub max_extend_minutes: u32,

    /// Timeout for the acquire transaction in milliseconds
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,

    /// How many times a transient acquire failure is retried
    #[serde(default = "default_acquire_retries")]
    pub acquire_retries: u32,

    /// Background sweep interval in seconds (0 = lazy expiry only)
    #[serde(default)]
    pub sweep_interval_seconds: u64,
}

fn default_ttl_minutes() -> u32 {
    30
}

fn default_max_extend_minutes() -> u32 {
    120
}

fn default_transaction_timeout_ms() -> u64 {
    5000
}

fn default_acquire_retries() -> u32 {
    1
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: default_ttl_minutes(),
            max_extend_minutes: default_max_extend_minutes(),
            transaction_timeout_ms: default_transaction_timeout_ms(),
            acquire_retries: default_acquire_retries(),
            sweep_interval_seconds: 0,
        }
    }
}

impl LockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject settings under which locks could not be taken or extended.
    ///
    /// An extend without `minutes` uses the TTL, so the TTL must fit under
    /// the extend bound.
    pub fn validate(&self) -> LockResult<()> {
        if self.default_ttl_minutes == 0 {
            return Err(LockError::invalid("default_ttl_minutes", "must be at least 1"));
        }
        if self.max_extend_minutes == 0 {
            return Err(LockError::invalid("max_extend_minutes", "must be at least 1"));
        }
        if self.default_ttl_minutes > self.max_extend_minutes {
            return Err(LockError::invalid(
                "default_ttl_minutes",
                format!(
                    "must not exceed max_extend_minutes ({})",
                    self.max_extend_minutes
                ),
            ));
        }
        if self.transaction_timeout_ms == 0 {
            return Err(LockError::invalid("transaction_timeout_ms", "must be at least 1"));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.default_ttl_minutes))
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// None when sweeping is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }
}
