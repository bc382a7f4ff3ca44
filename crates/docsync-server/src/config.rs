//! Configuration management for the docsync server

use anyhow::{Context, Result};
use docsync::LockConfig;
use serde::Deserialize;
use std::str::FromStr;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database URL (default: sqlite://./data/docsync.db)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum database connections (default: 10)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Root of the local repository checkouts documents are refreshed from.
    /// Unset means documents only change through the API.
    pub docs_checkout_root: Option<String>,

    /// CORS allowed origins (comma-separated). If empty, any origin is allowed.
    pub cors_allowed_origins: Option<String>,

    /// Lock behaviour
    #[serde(default)]
    pub lock: LockConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://./data/docsync.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from the file named by `DOCSYNC_CONFIG`, or from
    /// environment variables when it is unset
    pub fn load() -> Result<Self> {
        match std::env::var("DOCSYNC_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(&path),
            _ => Self::from_env(),
        }
    }

    /// Checks shared by every configuration source
    pub fn validate(&self) -> Result<()> {
        self.lock.validate().context("Invalid lock configuration")?;
        if self.max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1");
        }
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = LockConfig::default();
        let lock = LockConfig {
            default_ttl_minutes: parse_or(var("LOCK_TTL_MINUTES"), defaults.default_ttl_minutes),
            max_extend_minutes: parse_or(
                var("LOCK_MAX_EXTEND_MINUTES"),
                defaults.max_extend_minutes,
            ),
            transaction_timeout_ms: parse_or(
                var("LOCK_TX_TIMEOUT_MS"),
                defaults.transaction_timeout_ms,
            ),
            acquire_retries: defaults.acquire_retries,
            sweep_interval_seconds: parse_or(
                var("LOCK_SWEEP_INTERVAL_SECS"),
                defaults.sweep_interval_seconds,
            ),
        };
        let config = Self {
            host: var("DOCSYNC_HOST").unwrap_or_else(default_host),
            port: parse_or(var("DOCSYNC_PORT"), default_port()),
            database_url: var("DATABASE_URL").unwrap_or_else(default_database_url),
            max_connections: parse_or(var("DATABASE_MAX_CONNECTIONS"), default_max_connections()),
            docs_checkout_root: var("DOCS_CHECKOUT_ROOT").filter(|s| !s.is_empty()),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS").filter(|s| !s.is_empty()),
            lock,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Parsed CORS origins; empty means any origin
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            docs_checkout_root: None,
            cors_allowed_origins: None,
            lock: LockConfig::default(),
        }
    }
}
