//! Diesel ORM records for database tables, and their conversion into
//! domain models.

use diesel::prelude::*;

use super::{parse_datetime, parse_datetime_opt};
use crate::models::{
    FailureKind, File, FileStatus, FileVersion, ParseTable, Project, TablePayload,
};
use crate::schema;

/// Project record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::projects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProjectRecord {
    pub id: i32,
    pub org_id: i32,
    pub name: String,
    pub is_active: i32,
    pub created_at: String,
}

/// New project for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::projects)]
pub struct NewProject<'a> {
    pub org_id: i32,
    pub name: &'a str,
    pub is_active: i32,
    pub created_at: &'a str,
}

/// File record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FileRecord {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub status: String,
    pub active_version_id: Option<i32>,
    pub current_version: i32,
    pub parse_attempt: i32,
    pub parse_error: Option<String>,
    pub parse_failure: Option<String>,
    pub parse_started_at: Option<String>,
    pub parse_completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

/// New file for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::files)]
pub struct NewFile<'a> {
    pub project_id: i32,
    pub name: &'a str,
    pub size: i64,
    pub mime_type: Option<&'a str>,
    pub status: &'a str,
    pub current_version: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// File version record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::file_versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FileVersionRecord {
    pub id: i32,
    pub file_id: i32,
    pub version_number: i32,
    pub storage_path: String,
    pub size: i64,
    pub checksum: Option<String>,
    pub metadata: String,
    pub created_at: String,
}

/// New file version for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::file_versions)]
pub struct NewFileVersion<'a> {
    pub file_id: i32,
    pub version_number: i32,
    pub storage_path: &'a str,
    pub size: i64,
    pub checksum: Option<&'a str>,
    pub metadata: &'a str,
    pub created_at: &'a str,
}

/// Parse table record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::parse_tables)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ParseTableRecord {
    pub id: i32,
    pub file_id: i32,
    pub version_id: i32,
    pub attempt: i32,
    pub page_number: Option<i32>,
    pub table_index: i32,
    pub table_json: String,
    pub confidence: Option<f64>,
    pub created_at: String,
}

/// New parse table for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::parse_tables)]
pub struct NewParseTable<'a> {
    pub file_id: i32,
    pub version_id: i32,
    pub attempt: i32,
    pub page_number: Option<i32>,
    pub table_index: i32,
    pub table_json: &'a str,
    pub confidence: Option<f64>,
    pub created_at: &'a str,
}

impl From<ProjectRecord> for Project {
    fn from(record: ProjectRecord) -> Self {
        Self {
            id: record.id,
            org_id: record.org_id,
            name: record.name,
            is_active: record.is_active != 0,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

impl From<FileRecord> for File {
    fn from(record: FileRecord) -> Self {
        let status = FileStatus::from_str(&record.status).unwrap_or_else(|| {
            tracing::warn!(
                "File {} has unknown status '{}', treating as pending",
                record.id,
                record.status
            );
            FileStatus::Pending
        });

        Self {
            id: record.id,
            project_id: record.project_id,
            name: record.name,
            size: record.size,
            mime_type: record.mime_type,
            status,
            active_version_id: record.active_version_id,
            current_version: record.current_version,
            parse_attempt: record.parse_attempt,
            parse_error: record.parse_error,
            parse_failure: record
                .parse_failure
                .as_deref()
                .and_then(FailureKind::from_str),
            parse_started_at: parse_datetime_opt(record.parse_started_at),
            parse_completed_at: parse_datetime_opt(record.parse_completed_at),
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
            deleted_at: parse_datetime_opt(record.deleted_at),
        }
    }
}

impl From<FileVersionRecord> for FileVersion {
    fn from(record: FileVersionRecord) -> Self {
        Self {
            id: record.id,
            file_id: record.file_id,
            version_number: record.version_number,
            storage_path: record.storage_path,
            size: record.size,
            checksum: record.checksum,
            metadata: serde_json::from_str(&record.metadata).unwrap_or_default(),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

impl From<ParseTableRecord> for ParseTable {
    fn from(record: ParseTableRecord) -> Self {
        let payload = TablePayload::from_stored(&record.table_json);

        Self {
            id: record.id,
            file_id: record.file_id,
            version_id: record.version_id,
            attempt: record.attempt,
            page_number: record.page_number.unwrap_or(0),
            table_index: record.table_index,
            headers: payload.headers,
            rows: payload.rows,
            bbox: payload.bbox,
            confidence: record.confidence.or(payload.confidence),
            merged_cells: payload.merged_cells,
            row_count: payload.row_count,
            column_count: payload.column_count,
            created_at: parse_datetime(&record.created_at),
        }
    }
}
