//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection pool and hands out repositories that share it.

use std::path::Path;

use super::file::FileRepository;
use super::pool::{DieselError, SqlitePool};
use super::project::ProjectRepository;
use super::table::ParseTableRepository;

/// Database context that manages the connection pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::from_url("sqlite:/tmp/tablemark.db");
/// ctx.init_schema().await?;
/// let file = ctx.files().get(1).await?;
/// ```
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    /// Create a context from a `sqlite:` URL or bare path.
    pub fn from_url(url: &str) -> Self {
        Self {
            pool: SqlitePool::new(url),
        }
    }

    /// Create a context from a database file path.
    pub fn from_sqlite_path(path: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(path),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn projects(&self) -> ProjectRepository {
        ProjectRepository::new(self.pool.clone())
    }

    pub fn files(&self) -> FileRepository {
        FileRepository::new(self.pool.clone())
    }

    pub fn tables(&self) -> ParseTableRepository {
        ParseTableRepository::new(self.pool.clone())
    }

    /// Apply pending migrations.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        super::migrations::run_migrations(self.pool.database_url()).await
    }
}
