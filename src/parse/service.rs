//! Parse operations exposed to callers.
//!
//! Every operation takes the caller's organization id and resolves the file
//! through it, so a file of another organization is indistinguishable from
//! a missing one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::dispatcher::JobQueue;
use super::error::ParseError;
use super::job::ParseJob;
use crate::models::{FailureKind, File, FileStatus, ParseTable};
use crate::repository::DbContext;
use crate::storage::Storage;

/// Returned by an accepted trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerReceipt {
    pub file_id: i32,
    pub attempt: i32,
    pub status: FileStatus,
}

/// Parse progress of a file.
#[derive(Debug, Clone, Serialize)]
pub struct ParseStatus {
    pub file_id: i32,
    pub file_name: String,
    pub status: FileStatus,
    pub tables_found: i64,
    pub page_count: u32,
    pub attempt: i32,
    pub last_error: Option<String>,
    pub failure: Option<FailureKind>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ParseService {
    db: DbContext,
    storage: Arc<dyn Storage>,
    queue: JobQueue,
}

impl ParseService {
    pub fn new(db: DbContext, storage: Arc<dyn Storage>, queue: JobQueue) -> Self {
        Self { db, storage, queue }
    }

    /// Validate the file, claim it for parsing and queue the job.
    ///
    /// Validation failures leave the file untouched. Returns as soon as the
    /// job is queued.
    pub async fn trigger_parse(
        &self,
        org_id: i32,
        file_id: i32,
    ) -> Result<TriggerReceipt, ParseError> {
        let file = self.require_file(org_id, file_id).await?;

        if !file.is_pdf() {
            return Err(ParseError::InvalidState(format!(
                "File {} is not a PDF ({})",
                file_id,
                file.mime_type.as_deref().unwrap_or("unknown type")
            )));
        }

        let version_id = file.active_version_id.ok_or_else(|| {
            ParseError::InvalidState(format!("File {} has no active version", file_id))
        })?;
        let version = self
            .db
            .files()
            .get_version(version_id)
            .await?
            .filter(|v| !v.storage_path.is_empty())
            .ok_or_else(|| {
                ParseError::InvalidState(format!("File {} has no stored content", file_id))
            })?;

        if !self.storage.exists(&version.storage_path).await {
            return Err(ParseError::InvalidState(format!(
                "Stored content for file {} is missing",
                file_id
            )));
        }

        let attempt = match self.db.files().begin_parse(file_id, version.id).await? {
            Some(attempt) => attempt,
            None => return Err(self.lost_trigger(org_id, file_id).await),
        };

        let job = ParseJob {
            file_id,
            version_id: version.id,
            attempt,
            storage_path: version.storage_path,
            content_type: file
                .mime_type
                .unwrap_or_else(|| "application/pdf".to_string()),
        };

        if let Err(e) = self.queue.enqueue(job) {
            warn!("Could not queue parse of file {}: {}", file_id, e);
            if let Err(db_err) = self
                .db
                .files()
                .abort_parse(file_id, attempt, FailureKind::Dispatch, &e.to_string())
                .await
            {
                warn!(
                    "Failed to release file {} after queue error: {}",
                    file_id, db_err
                );
            }
            return Err(ParseError::Dispatch(e.to_string()));
        }

        info!("Queued parse of file {} (attempt {})", file_id, attempt);
        Ok(TriggerReceipt {
            file_id,
            attempt,
            status: FileStatus::InProgress,
        })
    }

    /// Current parse state. Read-only.
    pub async fn get_status(&self, org_id: i32, file_id: i32) -> Result<ParseStatus, ParseError> {
        let file = self.require_file(org_id, file_id).await?;
        let tables_found = self.db.tables().count_for_file(file_id).await?;

        let page_count = match file.active_version_id {
            Some(version_id) => self
                .db
                .files()
                .get_version(version_id)
                .await?
                .map(|v| v.page_count())
                .unwrap_or(0),
            None => 0,
        };

        Ok(ParseStatus {
            file_id: file.id,
            file_name: file.name,
            status: file.status,
            tables_found,
            page_count,
            attempt: file.parse_attempt,
            last_error: file.parse_error,
            failure: file.parse_failure,
            started_at: file.parse_started_at,
            completed_at: file.parse_completed_at,
        })
    }

    /// All tables of a file, ordered by page number then extraction order.
    pub async fn list_tables(
        &self,
        org_id: i32,
        file_id: i32,
    ) -> Result<Vec<ParseTable>, ParseError> {
        self.require_file(org_id, file_id).await?;
        Ok(self.db.tables().list_for_file(file_id).await?)
    }

    pub async fn get_table(
        &self,
        org_id: i32,
        file_id: i32,
        table_id: i32,
    ) -> Result<ParseTable, ParseError> {
        self.require_file(org_id, file_id).await?;
        self.db
            .tables()
            .get_for_file(file_id, table_id)
            .await?
            .ok_or_else(|| {
                ParseError::NotFound(format!("table {} of file {}", table_id, file_id))
            })
    }

    /// Poll until the file leaves `in_progress` or `timeout` elapses.
    /// Returns the last status seen either way.
    pub async fn wait_until_settled(
        &self,
        org_id: i32,
        file_id: i32,
        interval: Duration,
        timeout: Duration,
    ) -> Result<ParseStatus, ParseError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.get_status(org_id, file_id).await?;
            if status.status != FileStatus::InProgress
                || tokio::time::Instant::now() >= deadline
            {
                return Ok(status);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Explain why the status flip matched no row.
    async fn lost_trigger(&self, org_id: i32, file_id: i32) -> ParseError {
        match self.require_file(org_id, file_id).await {
            Ok(file) if file.status == FileStatus::InProgress => ParseError::Conflict(file_id),
            Ok(_) => ParseError::VersionChanged(file_id),
            Err(e) => e,
        }
    }

    async fn require_file(&self, org_id: i32, file_id: i32) -> Result<File, ParseError> {
        self.db
            .files()
            .get_scoped(org_id, file_id)
            .await?
            .ok_or_else(|| ParseError::NotFound(format!("file {}", file_id)))
    }
}
