//! Table extraction.
//!
//! `ExtractionClient` is the seam to the third-party layout analysis
//! service. Its raw output is turned into canonical table payloads by
//! [`normalize`].

mod azure;
pub mod normalize;

pub use azure::DocumentIntelligenceClient;
pub use normalize::{normalize, NormalizedTable};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::FailureKind;

/// One cell as reported by the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCell {
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub row_span: Option<usize>,
    #[serde(default)]
    pub column_span: Option<usize>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Where a table sits on a page. Polygon is a flat x,y list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBoundingRegion {
    pub page_number: i32,
    #[serde(default)]
    pub polygon: Vec<f64>,
}

/// A table as reported by the extraction service. Cells are unordered and
/// the grid may be sparse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<RawCell>,
    #[serde(default)]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

/// Result of analyzing one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocumentResult {
    pub page_count: u32,
    pub tables: Vec<RawTable>,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction service not configured: {0}")]
    NotConfigured(String),

    #[error("Extraction service refused the credentials: {0}")]
    Unauthorized(String),

    #[error("Extraction service unavailable: {0}")]
    Transient(String),

    #[error("Extraction service rejected the document: {0}")]
    Rejected(String),

    #[error("Invalid response from extraction service: {0}")]
    InvalidResponse(String),
}

impl ExtractionError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::NotConfigured(_) | Self::Unauthorized(_) => FailureKind::Configuration,
            Self::Transient(_) => FailureKind::Transient,
            Self::Rejected(_) | Self::InvalidResponse(_) => FailureKind::Permanent,
        }
    }
}

/// Layout analysis service that finds tables in a document.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn analyze(
        &self,
        content: &[u8],
        content_type: &str,
    ) -> Result<RawDocumentResult, ExtractionError>;
}
