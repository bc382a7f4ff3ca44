//! SQLite connection setup

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Open a pool for `database_url` and run migrations.
///
/// `busy_timeout` bounds how long a writer waits on another writer before
/// SQLite reports SQLITE_BUSY.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    busy_timeout: Duration,
) -> anyhow::Result<SqlitePool> {
    ensure_parent_dir(database_url)?;

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    crate::migrations::run_migration(&pool).await?;
    tracing::info!(database_url, "Database ready");

    Ok(pool)
}

/// Single-connection in-memory database, for tests and throwaway tooling.
///
/// The connection is never recycled, since the data lives only as long
/// as it does.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    crate::migrations::run_migration(&pool).await?;
    Ok(pool)
}

fn ensure_parent_dir(database_url: &str) -> std::io::Result<()> {
    if !database_url.starts_with("sqlite:") || database_url.contains(":memory:") {
        return Ok(());
    }
    let path = database_url.trim_start_matches("sqlite:");
    let path = path.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
