//! Extracted table models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Axis-aligned bounding box in the extraction service's page units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A cell that spans more than one grid position. Its content lives only at
/// the anchor `(row, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedCell {
    pub row: usize,
    pub column: usize,
    pub row_span: usize,
    pub column_span: usize,
}

/// Canonical table payload stored as JSON on each parse table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    /// Header rows. Row 0 of the extracted grid, so at most one row.
    pub headers: Vec<Vec<String>>,
    /// Data rows, rows 1..N of the extracted grid.
    pub rows: Vec<Vec<String>>,
    pub bbox: Option<BoundingBox>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub merged_cells: Vec<MergedCell>,
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub column_count: usize,
}

impl TablePayload {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Read a stored payload without trusting its shape.
    ///
    /// Rows written by older code may hold `null` or non-string cells, a flat
    /// header list, or be missing keys entirely. Cells always come back as
    /// strings and missing sections as empty sequences.
    pub fn from_stored(json: &str) -> Self {
        let value: Value = match serde_json::from_str(json) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Unreadable table payload: {}", e);
                return Self::default();
            }
        };

        let headers = value.get("headers").map(grid_from_value).unwrap_or_default();
        let rows = value.get("rows").map(grid_from_value).unwrap_or_default();
        let bbox = value
            .get("bbox")
            .and_then(|v| serde_json::from_value::<BoundingBox>(v.clone()).ok());
        let confidence = value.get("confidence").and_then(Value::as_f64);
        let merged_cells = value
            .get("merged_cells")
            .and_then(|v| serde_json::from_value::<Vec<MergedCell>>(v.clone()).ok())
            .unwrap_or_default();

        let row_count = value
            .get("row_count")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(headers.len() + rows.len());
        let column_count = value
            .get("column_count")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or_else(|| {
                headers
                    .iter()
                    .chain(rows.iter())
                    .map(Vec::len)
                    .max()
                    .unwrap_or(0)
            });

        Self {
            headers,
            rows,
            bbox,
            confidence,
            merged_cells,
            row_count,
            column_count,
        }
    }
}

fn grid_from_value(value: &Value) -> Vec<Vec<String>> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    // A flat list of cells is a single row
    if !items.is_empty() && items.iter().all(|v| !v.is_array()) {
        return vec![items.iter().map(cell_to_string).collect()];
    }

    items
        .iter()
        .map(|row| match row.as_array() {
            Some(cells) => cells.iter().map(cell_to_string).collect(),
            None => vec![cell_to_string(row)],
        })
        .collect()
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A persisted table, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseTable {
    pub id: i32,
    pub file_id: i32,
    pub version_id: i32,
    pub attempt: i32,
    /// 0 when the extraction service reported no page.
    pub page_number: i32,
    pub table_index: i32,
    pub headers: Vec<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    pub bbox: Option<BoundingBox>,
    pub confidence: Option<f64>,
    pub merged_cells: Vec<MergedCell>,
    pub row_count: usize,
    pub column_count: usize,
    pub created_at: DateTime<Utc>,
}
