use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_projects_org_id ON projects(org_id)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    name TEXT NOT NULL,
    size BIGINT NOT NULL DEFAULT 0,
    mime_type TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    active_version_id INTEGER,
    current_version INTEGER NOT NULL DEFAULT 1,
    parse_attempt INTEGER NOT NULL DEFAULT 0,
    parse_error TEXT,
    parse_failure TEXT,
    parse_started_at TEXT,
    parse_completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_files_project_id ON files(project_id)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_files_status ON files(status)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS file_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    version_number INTEGER NOT NULL,
    storage_path TEXT NOT NULL,
    size BIGINT NOT NULL DEFAULT 0,
    checksum TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    UNIQUE(file_id, version_number)
)"#,
        ))
}
