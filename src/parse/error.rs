//! Errors surfaced synchronously by the parse service.
//!
//! Failures of the background job never appear here; they are recorded on
//! the file row and read back through `get_status`.

use thiserror::Error;

use crate::repository::DieselError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("File {0} is already being parsed")]
    Conflict(i32),

    #[error("File {0} was replaced while the parse was being triggered, try again")]
    VersionChanged(i32),

    #[error("Parse job could not be queued: {0}")]
    Dispatch(String),

    #[error("Database error: {0}")]
    Database(#[from] DieselError),
}
