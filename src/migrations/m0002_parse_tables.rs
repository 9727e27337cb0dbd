use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_parse_tables")
        .depends_on(&["0001_initial"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS parse_tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    version_id INTEGER NOT NULL REFERENCES file_versions(id) ON DELETE CASCADE,
    attempt INTEGER NOT NULL,
    page_number INTEGER,
    table_index INTEGER NOT NULL,
    table_json TEXT NOT NULL,
    confidence REAL,
    created_at TEXT NOT NULL
)"#,
        ))
        // Listing order is (page_number, id) per file
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_parse_tables_file_page ON parse_tables(file_id, page_number, id)",
        ))
}
