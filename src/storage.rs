//! Storage adapter for uploaded file content.
//!
//! Content is addressed by a relative storage key recorded on each file
//! version. The parse job only ever reads through the `Storage` trait, so a
//! remote object store can replace the local backend.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage keyed by relative paths.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether an object exists at `key`. Invalid keys do not exist.
    async fn exists(&self, key: &str) -> bool;

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Store `content` at `key`, replacing any existing object.
    async fn write(&self, key: &str, content: &[u8]) -> Result<(), StorageError>;
}

/// Filesystem storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path under the root, refusing anything that could
    /// escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        if key.is_empty() || relative.is_absolute() {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(e) => {
                tracing::debug!("{}", e);
                false
            }
        }
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn write(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        let content = content.to_vec();

        // Write to a sibling temp file and rename so readers never see a
        // partial object
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let parent = path
                .parent()
                .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;
            std::fs::create_dir_all(parent)?;
            let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
            tmp.write_all(&content)?;
            tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }
}

/// Build the storage key for uploaded content.
///
/// `projects/{project_id}/files/{hash[0..2]}/{sanitized_basename}-{hash[0..8]}.{extension}`
pub fn content_storage_key(
    project_id: i32,
    checksum: &str,
    filename: &str,
    mime_type: Option<&str>,
) -> String {
    let path = Path::new(filename);
    let basename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| mime_to_extension(mime_type.unwrap_or_default()).to_string());

    format!(
        "projects/{}/files/{}/{}-{}.{}",
        project_id,
        &checksum[..2.min(checksum.len())],
        sanitize_filename(basename),
        &checksum[..8.min(checksum.len())],
        extension
    )
}

/// Replace characters that are unsafe in file names.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

/// Map MIME type to file extension.
pub fn mime_to_extension(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/tiff" => "tiff",
        "text/plain" => "txt",
        _ => "bin",
    }
}
