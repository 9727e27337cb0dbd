//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! over SQLite.

pub mod context;
pub mod file;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod project;
pub mod table;
pub mod util;

pub use context::DbContext;
pub use file::{CompletedParse, FileRepository, NewUpload};
pub use pool::{DieselError, SqlitePool};
pub use project::ProjectRepository;
pub use table::{ExtractedTableRow, ParseTableRepository};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
