//! The execute step of a parse attempt.
//!
//! Reads the stored document, runs layout extraction under a deadline,
//! normalizes every table and commits the results with the status change.
//! Any failure rolls the file back to `pending` with the failure recorded.
//! Errors never escape `run`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::extraction::{normalize, ExtractionClient};
use crate::models::FailureKind;
use crate::repository::{CompletedParse, DbContext, ExtractedTableRow};
use crate::storage::Storage;

/// Everything a worker needs to execute one accepted trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJob {
    pub file_id: i32,
    pub version_id: i32,
    /// Attempt number assigned when the trigger won the status flip.
    pub attempt: i32,
    pub storage_path: String,
    pub content_type: String,
}

/// Progress events emitted by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    Started {
        file_id: i32,
        attempt: i32,
    },
    Completed {
        file_id: i32,
        attempt: i32,
        tables: usize,
        pages: u32,
    },
    /// A newer attempt owns the file; nothing was written.
    Stale { file_id: i32, attempt: i32 },
    Failed {
        file_id: i32,
        attempt: i32,
        kind: FailureKind,
        error: String,
    },
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { tables: usize, pages: u32 },
    Stale,
    Failed { kind: FailureKind, error: String },
}

impl JobOutcome {
    pub fn into_event(self, job: &ParseJob) -> ParseEvent {
        let (file_id, attempt) = (job.file_id, job.attempt);
        match self {
            Self::Completed { tables, pages } => ParseEvent::Completed {
                file_id,
                attempt,
                tables,
                pages,
            },
            Self::Stale => ParseEvent::Stale { file_id, attempt },
            Self::Failed { kind, error } => ParseEvent::Failed {
                file_id,
                attempt,
                kind,
                error,
            },
        }
    }
}

#[derive(Debug)]
struct JobFailure {
    kind: FailureKind,
    message: String,
}

impl JobFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Executes parse jobs. Cheap to clone; each run opens its own connections.
#[derive(Clone)]
pub struct ParseJobRunner {
    db: DbContext,
    storage: Arc<dyn Storage>,
    client: Arc<dyn ExtractionClient>,
    timeout: Duration,
}

impl ParseJobRunner {
    pub fn new(
        db: DbContext,
        storage: Arc<dyn Storage>,
        client: Arc<dyn ExtractionClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            storage,
            client,
            timeout,
        }
    }

    pub async fn run(&self, job: &ParseJob) -> JobOutcome {
        debug!(
            "Parsing file {} attempt {} from {}",
            job.file_id, job.attempt, job.storage_path
        );

        match self.execute(job).await {
            Ok(Some((tables, pages))) => {
                info!(
                    "Parsed file {} attempt {}: {} tables, {} pages",
                    job.file_id, job.attempt, tables, pages
                );
                JobOutcome::Completed { tables, pages }
            }
            Ok(None) => {
                warn!(
                    "Discarding results of file {} attempt {}: superseded",
                    job.file_id, job.attempt
                );
                JobOutcome::Stale
            }
            Err(failure) => {
                self.fail(job, failure.kind, &failure.message).await;
                JobOutcome::Failed {
                    kind: failure.kind,
                    error: failure.message,
                }
            }
        }
    }

    /// Roll the attempt back to `pending` and record the failure.
    ///
    /// Returns whether the rollback landed. When it doesn't because the
    /// database is unreachable, the file stays `in_progress`.
    pub async fn fail(&self, job: &ParseJob, kind: FailureKind, message: &str) -> bool {
        if kind.is_retryable() {
            warn!(
                "Parse of file {} attempt {} failed ({}): {}",
                job.file_id, job.attempt, kind, message
            );
        } else {
            error!(
                "Parse of file {} attempt {} failed ({}): {}",
                job.file_id, job.attempt, kind, message
            );
        }

        match self
            .db
            .files()
            .abort_parse(job.file_id, job.attempt, kind, message)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                debug!(
                    "File {} no longer running attempt {}, rollback skipped",
                    job.file_id, job.attempt
                );
                false
            }
            Err(e) => {
                error!(
                    "Failed to roll back file {} attempt {}, it will stay in progress: {}",
                    job.file_id, job.attempt, e
                );
                false
            }
        }
    }

    /// `Ok(None)` when the attempt turned out to be stale.
    async fn execute(&self, job: &ParseJob) -> Result<Option<(usize, u32)>, JobFailure> {
        let content = self
            .storage
            .read(&job.storage_path)
            .await
            .map_err(|e| JobFailure::new(FailureKind::Storage, e.to_string()))?;

        let result = tokio::time::timeout(
            self.timeout,
            self.client.analyze(&content, &job.content_type),
        )
        .await
        .map_err(|_| {
            JobFailure::new(
                FailureKind::Transient,
                format!("extraction timed out after {:?}", self.timeout),
            )
        })?
        .map_err(|e| JobFailure::new(e.failure_kind(), e.to_string()))?;

        let rows: Vec<ExtractedTableRow> = result
            .tables
            .iter()
            .map(normalize)
            .map(|table| ExtractedTableRow {
                page_number: table.page_number,
                payload: table.payload,
            })
            .collect();

        let committed = self
            .db
            .files()
            .complete_parse(&CompletedParse {
                file_id: job.file_id,
                version_id: job.version_id,
                attempt: job.attempt,
                page_count: result.page_count,
                tables: &rows,
            })
            .await
            .map_err(|e| JobFailure::new(FailureKind::Persistence, e.to_string()))?;

        Ok(committed.then_some((rows.len(), result.page_count)))
    }
}
