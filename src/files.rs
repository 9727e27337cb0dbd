//! File uploads, replacement and deletion.
//!
//! Content goes to storage first and the database second, so a row never
//! points at bytes that were not written.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::models::{compute_checksum, File, FileStatus, FileVersion};
use crate::repository::{DbContext, DieselError, NewUpload};
use crate::storage::{content_storage_key, Storage, StorageError};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DieselError),
}

#[derive(Clone)]
pub struct FileService {
    db: DbContext,
    storage: Arc<dyn Storage>,
    max_upload_bytes: u64,
}

impl FileService {
    pub fn new(db: DbContext, storage: Arc<dyn Storage>, max_upload_bytes: u64) -> Self {
        Self {
            db,
            storage,
            max_upload_bytes,
        }
    }

    /// Store a new file in a project as version 1.
    pub async fn upload(
        &self,
        org_id: i32,
        project_id: i32,
        name: &str,
        content: &[u8],
        declared_mime: Option<&str>,
    ) -> Result<(File, FileVersion), FileError> {
        self.check_content(name, content)?;

        self.db
            .projects()
            .get_scoped(org_id, project_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| FileError::NotFound(format!("project {}", project_id)))?;

        let mime_type = detect_mime(name, content, declared_mime);
        let checksum = compute_checksum(content);
        let key = content_storage_key(project_id, &checksum, name, mime_type.as_deref());
        self.storage.write(&key, content).await?;

        let upload = NewUpload {
            storage_path: &key,
            size: content.len() as i64,
            mime_type: mime_type.as_deref(),
            checksum: Some(&checksum),
            metadata: version_metadata(name, mime_type.as_deref()),
        };
        let (file, version) = self.db.files().create(project_id, name, &upload).await?;

        info!(
            "Uploaded file {} '{}' ({} bytes) to project {}",
            file.id, name, file.size, project_id
        );
        Ok((file, version))
    }

    /// Add a new version of an existing file and make it active.
    pub async fn replace(
        &self,
        org_id: i32,
        file_id: i32,
        name: &str,
        content: &[u8],
        declared_mime: Option<&str>,
    ) -> Result<FileVersion, FileError> {
        self.check_content(name, content)?;

        let file = self.require_file(org_id, file_id).await?;
        if file.status == FileStatus::InProgress {
            return Err(FileError::Conflict(format!(
                "file {} is being parsed",
                file_id
            )));
        }

        let mime_type = detect_mime(name, content, declared_mime);
        let checksum = compute_checksum(content);
        let key = content_storage_key(file.project_id, &checksum, name, mime_type.as_deref());
        self.storage.write(&key, content).await?;

        let upload = NewUpload {
            storage_path: &key,
            size: content.len() as i64,
            mime_type: mime_type.as_deref(),
            checksum: Some(&checksum),
            metadata: version_metadata(name, mime_type.as_deref()),
        };
        let version = self
            .db
            .files()
            .add_version(file_id, &upload)
            .await?
            .ok_or_else(|| FileError::Conflict(format!("file {} is being parsed", file_id)))?;

        info!(
            "Replaced file {} with version {}",
            file_id, version.version_number
        );
        Ok(version)
    }

    pub async fn get(&self, org_id: i32, file_id: i32) -> Result<File, FileError> {
        self.require_file(org_id, file_id).await
    }

    pub async fn list(&self, org_id: i32, project_id: Option<i32>) -> Result<Vec<File>, FileError> {
        Ok(self.db.files().list_scoped(org_id, project_id).await?)
    }

    pub async fn versions(&self, org_id: i32, file_id: i32) -> Result<Vec<FileVersion>, FileError> {
        self.require_file(org_id, file_id).await?;
        Ok(self.db.files().list_versions(file_id).await?)
    }

    /// Tombstone a file. Stored content and versions are kept.
    pub async fn soft_delete(&self, org_id: i32, file_id: i32) -> Result<(), FileError> {
        self.require_file(org_id, file_id).await?;
        if !self.db.files().soft_delete(file_id).await? {
            return Err(FileError::Conflict(format!(
                "file {} is being parsed",
                file_id
            )));
        }
        info!("Deleted file {}", file_id);
        Ok(())
    }

    fn check_content(&self, name: &str, content: &[u8]) -> Result<(), FileError> {
        if name.trim().is_empty() {
            return Err(FileError::InvalidInput("file name is empty".into()));
        }
        if content.is_empty() {
            return Err(FileError::InvalidInput("file is empty".into()));
        }
        let size = content.len() as u64;
        if size > self.max_upload_bytes {
            return Err(FileError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    async fn require_file(&self, org_id: i32, file_id: i32) -> Result<File, FileError> {
        self.db
            .files()
            .get_scoped(org_id, file_id)
            .await?
            .ok_or_else(|| FileError::NotFound(format!("file {}", file_id)))
    }
}

/// Pick a MIME type: the caller's, then content sniffing, then the name.
pub fn detect_mime(name: &str, content: &[u8], declared: Option<&str>) -> Option<String> {
    if let Some(declared) = declared
        .map(str::trim)
        .filter(|m| !m.is_empty() && *m != OCTET_STREAM)
    {
        return Some(declared.to_string());
    }

    if let Some(kind) = infer::get(content) {
        return Some(kind.mime_type().to_string());
    }

    mime_guess::from_path(name).first().map(|m| m.to_string())
}

fn version_metadata(
    name: &str,
    mime_type: Option<&str>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("original_filename".into(), name.into());
    if let Some(mime_type) = mime_type {
        metadata.insert("mime_type".into(), mime_type.into());
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_mime_wins() {
        assert_eq!(
            detect_mime("a.bin", b"hello", Some("application/pdf")).as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn sniffs_pdf_magic() {
        assert_eq!(
            detect_mime("upload", b"%PDF-1.7\n...", Some(OCTET_STREAM)).as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn falls_back_to_extension() {
        assert_eq!(
            detect_mime("notes.txt", b"plain words", None).as_deref(),
            Some("text/plain")
        );
        assert_eq!(detect_mime("blob", b"\x00\x01", None), None);
    }
}
