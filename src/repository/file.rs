//! File repository.
//!
//! Owns the file status transitions. Every transition out of or into
//! `in_progress` is a single conditional UPDATE, so concurrent callers can
//! race on the same row without a separate lock.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{FileRecord, FileVersionRecord, NewFile, NewFileVersion};
use super::pool::{DieselError, SqlitePool};
use super::table::{replace_for_file, ExtractedTableRow};
use super::util::{last_insert_id, now_timestamp};
use crate::models::{FailureKind, File, FileStatus, FileVersion};
use crate::schema::{file_versions, files, projects};

/// Content of a new file version.
#[derive(Debug, Clone)]
pub struct NewUpload<'a> {
    pub storage_path: &'a str,
    pub size: i64,
    pub mime_type: Option<&'a str>,
    pub checksum: Option<&'a str>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Results of a finished parse attempt.
#[derive(Debug, Clone)]
pub struct CompletedParse<'a> {
    pub file_id: i32,
    pub version_id: i32,
    pub attempt: i32,
    pub page_count: u32,
    pub tables: &'a [ExtractedTableRow],
}

#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a file by id regardless of owner or tombstone.
    pub async fn get(&self, file_id: i32) -> Result<Option<File>, DieselError> {
        let mut conn = self.pool.get().await?;

        files::table
            .find(file_id)
            .select(FileRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|r| r.map(File::from))
    }

    /// Get a live file owned (through its project) by `org_id`.
    pub async fn get_scoped(&self, org_id: i32, file_id: i32) -> Result<Option<File>, DieselError> {
        let mut conn = self.pool.get().await?;

        files::table
            .inner_join(projects::table)
            .filter(files::id.eq(file_id))
            .filter(projects::org_id.eq(org_id))
            .filter(files::deleted_at.is_null())
            .select(FileRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|r| r.map(File::from))
    }

    /// List live files of an organization, optionally within one project.
    pub async fn list_scoped(
        &self,
        org_id: i32,
        project_id: Option<i32>,
    ) -> Result<Vec<File>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = files::table
            .inner_join(projects::table)
            .filter(projects::org_id.eq(org_id))
            .filter(files::deleted_at.is_null())
            .select(FileRecord::as_select())
            .into_boxed();

        if let Some(project_id) = project_id {
            query = query.filter(files::project_id.eq(project_id));
        }

        query
            .order(files::id.asc())
            .load(&mut conn)
            .await
            .map(|records| records.into_iter().map(File::from).collect())
    }

    /// Create a file with its first version and point the file at it.
    pub async fn create(
        &self,
        project_id: i32,
        name: &str,
        upload: &NewUpload<'_>,
    ) -> Result<(File, FileVersion), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_timestamp();
        let metadata = serde_json::to_string(&upload.metadata).unwrap_or_else(|_| "{}".into());

        let (file_id, version_id) = conn
            .transaction::<_, DieselError, _>(|conn| {
                Box::pin(async move {
                    diesel::insert_into(files::table)
                        .values(NewFile {
                            project_id,
                            name,
                            size: upload.size,
                            mime_type: upload.mime_type,
                            status: FileStatus::Pending.as_str(),
                            current_version: 1,
                            created_at: &now,
                            updated_at: &now,
                        })
                        .execute(conn)
                        .await?;
                    let file_id = last_insert_id(conn).await?;

                    diesel::insert_into(file_versions::table)
                        .values(NewFileVersion {
                            file_id,
                            version_number: 1,
                            storage_path: upload.storage_path,
                            size: upload.size,
                            checksum: upload.checksum,
                            metadata: &metadata,
                            created_at: &now,
                        })
                        .execute(conn)
                        .await?;
                    let version_id = last_insert_id(conn).await?;

                    diesel::update(files::table.find(file_id))
                        .set(files::active_version_id.eq(Some(version_id)))
                        .execute(conn)
                        .await?;

                    Ok((file_id, version_id))
                })
            })
            .await?;

        let file = files::table
            .find(file_id)
            .select(FileRecord::as_select())
            .first(&mut conn)
            .await?;
        let version = file_versions::table
            .find(version_id)
            .select(FileVersionRecord::as_select())
            .first(&mut conn)
            .await?;

        Ok((file.into(), version.into()))
    }

    /// Add a new version and make it active.
    ///
    /// Returns `None` without writing anything when the file is being parsed
    /// or has been deleted.
    pub async fn add_version(
        &self,
        file_id: i32,
        upload: &NewUpload<'_>,
    ) -> Result<Option<FileVersion>, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_timestamp();
        let metadata = serde_json::to_string(&upload.metadata).unwrap_or_else(|_| "{}".into());

        conn.transaction::<_, DieselError, _>(|conn| {
            Box::pin(async move {
                let rows = diesel::update(
                    files::table
                        .filter(files::id.eq(file_id))
                        .filter(files::status.ne(FileStatus::InProgress.as_str()))
                        .filter(files::deleted_at.is_null()),
                )
                .set((
                    files::current_version.eq(files::current_version + 1),
                    files::size.eq(upload.size),
                    files::mime_type.eq(upload.mime_type),
                    files::status.eq(FileStatus::Pending.as_str()),
                    files::updated_at.eq(&now),
                ))
                .execute(conn)
                .await?;

                if rows == 0 {
                    return Ok(None);
                }

                let version_number: i32 = files::table
                    .find(file_id)
                    .select(files::current_version)
                    .first(conn)
                    .await?;

                diesel::insert_into(file_versions::table)
                    .values(NewFileVersion {
                        file_id,
                        version_number,
                        storage_path: upload.storage_path,
                        size: upload.size,
                        checksum: upload.checksum,
                        metadata: &metadata,
                        created_at: &now,
                    })
                    .execute(conn)
                    .await?;
                let version_id = last_insert_id(conn).await?;

                diesel::update(files::table.find(file_id))
                    .set(files::active_version_id.eq(Some(version_id)))
                    .execute(conn)
                    .await?;

                file_versions::table
                    .find(version_id)
                    .select(FileVersionRecord::as_select())
                    .first(conn)
                    .await
                    .map(|r| Some(FileVersion::from(r)))
            })
        })
        .await
    }

    pub async fn get_version(&self, version_id: i32) -> Result<Option<FileVersion>, DieselError> {
        let mut conn = self.pool.get().await?;

        file_versions::table
            .find(version_id)
            .select(FileVersionRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|r| r.map(FileVersion::from))
    }

    pub async fn list_versions(&self, file_id: i32) -> Result<Vec<FileVersion>, DieselError> {
        let mut conn = self.pool.get().await?;

        file_versions::table
            .filter(file_versions::file_id.eq(file_id))
            .order(file_versions::version_number.asc())
            .select(FileVersionRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| records.into_iter().map(FileVersion::from).collect())
    }

    /// Tombstone a file. Refused while a parse is running.
    pub async fn soft_delete(&self, file_id: i32) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_timestamp();

        let rows = diesel::update(
            files::table
                .filter(files::id.eq(file_id))
                .filter(files::deleted_at.is_null())
                .filter(files::status.ne(FileStatus::InProgress.as_str())),
        )
        .set((files::deleted_at.eq(Some(now.as_str())), files::updated_at.eq(&now)))
        .execute(&mut conn)
        .await?;

        Ok(rows > 0)
    }

    /// Move a live file into `in_progress` unless it already is, provided
    /// `version_id` is still its active version.
    ///
    /// Returns the new attempt number, or `None` if another trigger won or
    /// the file was replaced in the meantime.
    pub async fn begin_parse(
        &self,
        file_id: i32,
        version_id: i32,
    ) -> Result<Option<i32>, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_timestamp();

        conn.transaction::<_, DieselError, _>(|conn| {
            Box::pin(async move {
                let rows = diesel::update(
                    files::table
                        .filter(files::id.eq(file_id))
                        .filter(files::status.ne(FileStatus::InProgress.as_str()))
                        .filter(files::active_version_id.eq(Some(version_id)))
                        .filter(files::deleted_at.is_null()),
                )
                .set((
                    files::status.eq(FileStatus::InProgress.as_str()),
                    files::parse_attempt.eq(files::parse_attempt + 1),
                    files::parse_started_at.eq(Some(now.as_str())),
                    files::parse_completed_at.eq(None::<String>),
                    files::parse_error.eq(None::<String>),
                    files::parse_failure.eq(None::<String>),
                    files::updated_at.eq(&now),
                ))
                .execute(conn)
                .await?;

                if rows == 0 {
                    return Ok(None);
                }

                files::table
                    .find(file_id)
                    .select(files::parse_attempt)
                    .first::<i32>(conn)
                    .await
                    .map(Some)
            })
        })
        .await
    }

    /// Roll an attempt back to `pending`, recording why it failed.
    ///
    /// Does nothing if the file is no longer running `attempt`.
    pub async fn abort_parse(
        &self,
        file_id: i32,
        attempt: i32,
        kind: FailureKind,
        error: &str,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_timestamp();

        let rows = diesel::update(
            files::table
                .filter(files::id.eq(file_id))
                .filter(files::status.eq(FileStatus::InProgress.as_str()))
                .filter(files::parse_attempt.eq(attempt)),
        )
        .set((
            files::status.eq(FileStatus::Pending.as_str()),
            files::parse_error.eq(Some(error)),
            files::parse_failure.eq(Some(kind.as_str())),
            files::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows > 0)
    }

    /// Commit a finished attempt: mark the file completed, replace its
    /// tables and stamp counts on the parsed version, all or nothing.
    ///
    /// Returns `false` without writing if the attempt is stale.
    pub async fn complete_parse(&self, parse: &CompletedParse<'_>) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_timestamp();

        conn.transaction::<_, DieselError, _>(|conn| {
            Box::pin(async move {
                let rows = diesel::update(
                    files::table
                        .filter(files::id.eq(parse.file_id))
                        .filter(files::status.eq(FileStatus::InProgress.as_str()))
                        .filter(files::parse_attempt.eq(parse.attempt)),
                )
                .set((
                    files::status.eq(FileStatus::Completed.as_str()),
                    files::parse_completed_at.eq(Some(now.as_str())),
                    files::parse_error.eq(None::<String>),
                    files::parse_failure.eq(None::<String>),
                    files::updated_at.eq(&now),
                ))
                .execute(conn)
                .await?;

                if rows == 0 {
                    return Ok(false);
                }

                replace_for_file(
                    conn,
                    parse.file_id,
                    parse.version_id,
                    parse.attempt,
                    parse.tables,
                    &now,
                )
                .await?;

                let stored: Option<String> = file_versions::table
                    .find(parse.version_id)
                    .select(file_versions::metadata)
                    .first(conn)
                    .await
                    .optional()?;

                if let Some(stored) = stored {
                    let mut metadata: serde_json::Map<String, serde_json::Value> =
                        serde_json::from_str(&stored).unwrap_or_default();
                    metadata.insert("page_count".into(), parse.page_count.into());
                    metadata.insert("table_count".into(), parse.tables.len().into());
                    let metadata =
                        serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());

                    diesel::update(file_versions::table.find(parse.version_id))
                        .set(file_versions::metadata.eq(&metadata))
                        .execute(conn)
                        .await?;
                }

                Ok(true)
            })
        })
        .await
    }
}
