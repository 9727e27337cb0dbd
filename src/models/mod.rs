//! Data models for tablemark.

mod file;
mod project;
mod table;

pub use file::{compute_checksum, FailureKind, File, FileStatus, FileVersion};
pub use project::Project;
pub use table::{BoundingBox, MergedCell, ParseTable, TablePayload};
