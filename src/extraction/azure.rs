//! Azure AI Document Intelligence layout client.
//!
//! Submits the document to the `prebuilt-layout` model and polls the
//! long-running operation until it settles. Requires
//! AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT and AZURE_DOCUMENT_INTELLIGENCE_KEY
//! (or the matching config entries).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    ExtractionClient, ExtractionError, RawBoundingRegion, RawCell, RawDocumentResult, RawTable,
};
use crate::config::ExtractionSettings;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

pub struct DocumentIntelligenceClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    model_id: String,
    api_version: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    error: Option<ServiceError>,
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
    #[serde(default)]
    tables: Vec<AnalyzedTable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedPage {
    #[allow(dead_code)]
    page_number: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedTable {
    row_count: usize,
    column_count: usize,
    #[serde(default)]
    cells: Vec<AnalyzedCell>,
    #[serde(default)]
    bounding_regions: Vec<BoundingRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedCell {
    row_index: usize,
    column_index: usize,
    #[serde(default)]
    content: Option<String>,
    row_span: Option<usize>,
    column_span: Option<usize>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundingRegion {
    page_number: i32,
    #[serde(default)]
    polygon: Vec<f64>,
}

impl DocumentIntelligenceClient {
    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            endpoint: settings
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string())
                .filter(|e| !e.is_empty()),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            model_id: settings.model_id.clone(),
            api_version: settings.api_version.clone(),
            poll_interval: settings.poll_interval(),
        }
    }

    /// Whether both endpoint and key are present.
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }

    fn analyze_url(&self, endpoint: &str) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            endpoint, self.model_id, self.api_version
        )
    }

    async fn submit(
        &self,
        endpoint: &str,
        api_key: &str,
        content: &[u8],
        content_type: &str,
    ) -> Result<String, ExtractionError> {
        let response = self
            .http
            .post(self.analyze_url(endpoint))
            .header(KEY_HEADER, api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| ExtractionError::Transient(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ExtractionError::InvalidResponse("missing Operation-Location header".to_string())
            })
    }

    async fn poll(
        &self,
        operation_url: &str,
        api_key: &str,
    ) -> Result<RawDocumentResult, ExtractionError> {
        let mut wait = self.poll_interval;
        loop {
            tokio::time::sleep(wait).await;

            let response = self
                .http
                .get(operation_url)
                .header(KEY_HEADER, api_key)
                .send()
                .await
                .map_err(|e| ExtractionError::Transient(format!("HTTP request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status, &body));
            }

            wait = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(self.poll_interval);

            let body = response
                .text()
                .await
                .map_err(|e| ExtractionError::Transient(format!("Failed to read response: {}", e)))?;

            match parse_operation(&body)? {
                Some(result) => return Ok(result),
                None => debug!("Layout analysis still running, next poll in {:?}", wait),
            }
        }
    }
}

#[async_trait]
impl ExtractionClient for DocumentIntelligenceClient {
    async fn analyze(
        &self,
        content: &[u8],
        content_type: &str,
    ) -> Result<RawDocumentResult, ExtractionError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            ExtractionError::NotConfigured("AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT not set".into())
        })?;
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ExtractionError::NotConfigured("AZURE_DOCUMENT_INTELLIGENCE_KEY not set".into())
        })?;

        info!(
            "Submitting {} byte document to {} ({})",
            content.len(),
            self.model_id,
            content_type
        );
        let operation_url = self.submit(endpoint, api_key, content, content_type).await?;
        let result = self.poll(&operation_url, api_key).await?;
        info!(
            "Layout analysis found {} tables across {} pages",
            result.tables.len(),
            result.page_count
        );
        Ok(result)
    }
}

/// Decode one poll response. `None` while the operation is still running.
fn parse_operation(body: &str) -> Result<Option<RawDocumentResult>, ExtractionError> {
    let operation: AnalyzeOperation = serde_json::from_str(body)
        .map_err(|e| ExtractionError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    match operation.status.as_str() {
        "notStarted" | "running" => Ok(None),
        "succeeded" => {
            let result = operation.analyze_result.ok_or_else(|| {
                ExtractionError::InvalidResponse("succeeded without analyzeResult".to_string())
            })?;
            Ok(Some(into_document_result(result)))
        }
        "failed" => {
            let message = operation
                .error
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.code.unwrap_or_else(|| "Error".into()),
                        e.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| "analysis failed".to_string());
            Err(ExtractionError::Rejected(message))
        }
        other => Err(ExtractionError::InvalidResponse(format!(
            "unknown operation status '{}'",
            other
        ))),
    }
}

fn into_document_result(result: AnalyzeResult) -> RawDocumentResult {
    RawDocumentResult {
        page_count: result.pages.len() as u32,
        tables: result
            .tables
            .into_iter()
            .map(|table| RawTable {
                row_count: table.row_count,
                column_count: table.column_count,
                cells: table
                    .cells
                    .into_iter()
                    .map(|cell| RawCell {
                        row_index: cell.row_index,
                        column_index: cell.column_index,
                        content: cell.content,
                        row_span: cell.row_span,
                        column_span: cell.column_span,
                        confidence: cell.confidence,
                    })
                    .collect(),
                bounding_regions: table
                    .bounding_regions
                    .into_iter()
                    .map(|region| RawBoundingRegion {
                        page_number: region.page_number,
                        polygon: region.polygon,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Map an HTTP failure onto the retryable/permanent split.
fn classify_status(status: StatusCode, body: &str) -> ExtractionError {
    let message = format!("Document Intelligence API error ({}): {}", status, body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ExtractionError::Unauthorized(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ExtractionError::Transient(message)
    } else {
        ExtractionError::Rejected(message)
    }
}
