//! File and file version models.
//!
//! A file is the logical upload; each upload or replacement adds an
//! immutable version and repoints the file's active version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle status of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    ReadyForAnnotation,
    InProgress,
    Completed,
    Archived,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ReadyForAnnotation => "ready_for_annotation",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ready_for_annotation" => Some(Self::ReadyForAnnotation),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a background parse attempt failed.
///
/// Recorded on the file row next to the error message so a failed attempt
/// can be told apart from a file that was never parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Stored bytes could not be read.
    Storage,
    /// Extraction service credentials or endpoint missing.
    Configuration,
    /// Network error, throttling, server error or timeout.
    Transient,
    /// The extraction service rejected the document.
    Permanent,
    /// Writing results failed.
    Persistence,
    /// The job could not be queued.
    Dispatch,
    /// The job panicked.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Configuration => "configuration",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Persistence => "persistence",
            Self::Dispatch => "dispatch",
            Self::Internal => "internal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "storage" => Some(Self::Storage),
            "configuration" => Some(Self::Configuration),
            "transient" => Some(Self::Transient),
            "permanent" => Some(Self::Permanent),
            "persistence" => Some(Self::Persistence),
            "dispatch" => Some(Self::Dispatch),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }

    /// Whether retrying the same document later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Dispatch | Self::Persistence)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub status: FileStatus,
    pub active_version_id: Option<i32>,
    pub current_version: i32,
    /// Incremented every time a parse is accepted.
    pub parse_attempt: i32,
    pub parse_error: Option<String>,
    pub parse_failure: Option<FailureKind>,
    pub parse_started_at: Option<DateTime<Utc>>,
    pub parse_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl File {
    /// Whether the recorded MIME type identifies a PDF.
    pub fn is_pdf(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.to_ascii_lowercase().contains("pdf"))
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Immutable snapshot of a file's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVersion {
    pub id: i32,
    pub file_id: i32,
    pub version_number: i32,
    /// Storage key understood by the storage adapter.
    pub storage_path: String,
    pub size: i64,
    /// SHA-256 of the content, hex encoded.
    pub checksum: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl FileVersion {
    /// Page count stamped by the last successful parse, 0 if never parsed.
    pub fn page_count(&self) -> u32 {
        self.metadata_u32("page_count")
    }

    /// Table count stamped by the last successful parse.
    pub fn table_count(&self) -> u32 {
        self.metadata_u32("table_count")
    }

    fn metadata_u32(&self, key: &str) -> u32 {
        self.metadata
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(0)
    }
}

/// Compute SHA-256 hash of content.
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
