//! Configuration management for tablemark using the prefer crate.
//!
//! `Config` is what lives in the config file, every field optional.
//! `Settings` is the resolved runtime view built from defaults, the config
//! file and environment overrides, in that order.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::DbContext;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "tablemark.db";

/// Subdirectory of the data dir holding uploaded content.
pub const STORAGE_SUBDIR: &str = "storage";

/// Largest accepted upload (50 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const ENDPOINT_ENV: &str = "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT";
const API_KEY_ENV: &str = "AZURE_DOCUMENT_INTELLIGENCE_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Layout extraction service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model_id: String,
    pub api_version: String,
    /// Upper bound on a whole analysis, submit to final poll.
    pub timeout_secs: u64,
    /// Upper bound on a single HTTP exchange with the service.
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            endpoint: env_non_empty(ENDPOINT_ENV),
            api_key: env_non_empty(API_KEY_ENV),
            model_id: "prebuilt-layout".to_string(),
            api_version: "2024-11-30".to_string(),
            timeout_secs: 120,
            request_timeout_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

impl ExtractionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Background parse worker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Parse jobs allowed to run at once.
    pub concurrency: usize,
    /// Jobs that may wait in the queue. Triggers beyond this fail with a
    /// dispatch error.
    pub queue_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 2,
            queue_capacity: 64,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Root of the local storage backend.
    pub storage_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub extraction: ExtractionSettings,
    pub workers: WorkerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/tablemark/ for user data
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tablemark");

        Self {
            storage_dir: data_dir.join(STORAGE_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            extraction: ExtractionSettings::default(),
            workers: WorkerSettings::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            storage_dir: data_dir.join(STORAGE_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url())
    }

    /// Ensure data and storage directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [("data", &self.data_dir), ("storage", &self.storage_dir)] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }
}

/// Extraction section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

/// Worker section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Storage root (defaults to `{data_dir}/storage`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_mb: Option<u64>,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers tablemark config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("tablemark").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path).await?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            })?,
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            })?,
            _ => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.storage_dir = settings.data_dir.join(STORAGE_SUBDIR);
        }
        if let Some(ref storage_dir) = self.storage_dir {
            settings.storage_dir = self.resolve_path(storage_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(mb) = self.max_upload_mb {
            settings.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        }

        let extraction = &self.extraction;
        if let Some(ref endpoint) = extraction.endpoint {
            settings.extraction.endpoint = Some(endpoint.clone());
        }
        if let Some(ref api_key) = extraction.api_key {
            settings.extraction.api_key = Some(api_key.clone());
        }
        if let Some(ref model_id) = extraction.model_id {
            settings.extraction.model_id = model_id.clone();
        }
        if let Some(ref api_version) = extraction.api_version {
            settings.extraction.api_version = api_version.clone();
        }
        if let Some(timeout) = extraction.timeout_secs {
            settings.extraction.timeout_secs = timeout;
        }
        if let Some(timeout) = extraction.request_timeout_secs {
            settings.extraction.request_timeout_secs = timeout;
        }
        if let Some(interval) = extraction.poll_interval_ms {
            settings.extraction.poll_interval_ms = interval;
        }

        if let Some(concurrency) = self.workers.concurrency {
            settings.workers.concurrency = concurrency.max(1);
        }
        if let Some(capacity) = self.workers.queue_capacity {
            settings.workers.queue_capacity = capacity.max(1);
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Data directory override (--data flag).
    pub data: Option<PathBuf>,
}

/// Load settings from config file, CLI options and environment.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Config::default()
            }
        },
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    // Determine base directory for resolving relative paths
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd()
    } else {
        config.base_dir().unwrap_or_else(cwd)
    };

    config.apply_to_settings(&mut settings, &base_dir);

    // --data override takes precedence for data_dir and storage_dir
    if let Some(data_dir) = options.data {
        settings.storage_dir = data_dir.join(STORAGE_SUBDIR);
        settings.data_dir = data_dir;
    }

    // Environment variables take highest precedence
    if let Some(database_url) = env_non_empty("DATABASE_URL") {
        tracing::debug!("Using DATABASE_URL from environment: {}", database_url);
        settings.database_url = Some(database_url);
    }
    if let Some(endpoint) = env_non_empty(ENDPOINT_ENV) {
        settings.extraction.endpoint = Some(endpoint);
    }
    if let Some(api_key) = env_non_empty(API_KEY_ENV) {
        settings.extraction.api_key = Some(api_key);
    }

    (settings, config)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_toml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tablemark.toml");
        fs::write(
            &path,
            r#"
data_dir = "data"
max_upload_mb = 10

[extraction]
endpoint = "https://example.cognitiveservices.azure.com/"
timeout_secs = 30
request_timeout_secs = 15

[workers]
concurrency = 4
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());

        assert_eq!(settings.data_dir, dir.path().join("data"));
        assert_eq!(settings.storage_dir, dir.path().join("data").join("storage"));
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(
            settings.extraction.endpoint.as_deref(),
            Some("https://example.cognitiveservices.azure.com/")
        );
        assert_eq!(settings.extraction.timeout(), Duration::from_secs(30));
        assert_eq!(settings.extraction.request_timeout(), Duration::from_secs(15));
        assert_eq!(settings.workers.concurrency, 4);
        assert_eq!(settings.workers.queue_capacity, 64);
    }

    #[tokio::test]
    async fn loads_yaml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tablemark.yaml");
        fs::write(&path, "database: other.db\nstorage_dir: /srv/blobs\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
        config.apply_to_settings(&mut settings, dir.path());

        assert_eq!(settings.database_path(), dir.path().join("other.db"));
        assert_eq!(settings.storage_dir, PathBuf::from("/srv/blobs"));
    }

    #[tokio::test]
    async fn malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tablemark.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "JSON", .. }));
    }

    #[test]
    fn huge_upload_limit_saturates() {
        let config = Config {
            max_upload_mb: Some(u64::MAX / 2),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/"));
        assert_eq!(settings.max_upload_bytes, u64::MAX);
    }

    #[test]
    fn database_url_defaults_to_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/tm"));
        assert_eq!(settings.database_url(), "sqlite:/tmp/tm/tablemark.db");
    }
}
