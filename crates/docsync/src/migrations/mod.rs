//! Database migrations for the docsync platform

/// Migration SQL for platform tables
pub const MIGRATION_SQL: &str = r#"
-- projects: documentation projects synced from a repository
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    repo_url TEXT,
    branch TEXT NOT NULL DEFAULT 'main',
    docs_path TEXT NOT NULL DEFAULT 'docs',
    created_at TEXT DEFAULT (datetime('now'))
);

-- documents: current content of each synced file
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,
    content TEXT NOT NULL,
    hash TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE(project_id, file_name)
);
CREATE INDEX IF NOT EXISTS idx_documents_project ON documents(project_id);

-- project_locks: at most one row per project, timestamps in epoch millis
CREATE TABLE IF NOT EXISTS project_locks (
    project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
    locked_by TEXT NOT NULL,
    reason TEXT,
    locked_at INTEGER NOT NULL,
    expires_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_project_locks_expires ON project_locks(expires_at);

-- api_keys: per-project keys for the hook endpoints
CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    key_hash TEXT NOT NULL UNIQUE,
    key_prefix TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_api_keys_project ON api_keys(project_id);
"#;

/// Run all migrations
pub async fn run_migration(pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
    let script = strip_comments(MIGRATION_SQL);
    for statement in script.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn strip_comments(statement: &str) -> String {
    statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
