//! Raw extraction tables to canonical payloads.
//!
//! Pure and total: any `RawTable` normalizes, whatever its cells claim.

use tracing::{debug, warn};

use super::{RawBoundingRegion, RawTable};
use crate::models::{BoundingBox, MergedCell, TablePayload};

/// Smallest polygon that describes a box: four x,y points.
const MIN_POLYGON_SCALARS: usize = 8;

/// Largest grid built for one table. Claimed dimensions beyond this are cut
/// back to what the cells actually cover.
const MAX_GRID_CELLS: usize = 1_000_000;

/// A normalized table and the page it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub page_number: Option<i32>,
    pub payload: TablePayload,
}

pub fn normalize(raw: &RawTable) -> NormalizedTable {
    let (rows, columns) = grid_dimensions(raw);

    let mut grid = vec![vec![String::new(); columns]; rows];
    let mut merged_cells = Vec::new();

    for cell in &raw.cells {
        if cell.row_index >= rows || cell.column_index >= columns {
            debug!(
                "Dropping cell ({}, {}) outside {}x{} grid",
                cell.row_index, cell.column_index, rows, columns
            );
            continue;
        }

        grid[cell.row_index][cell.column_index] = cell.content.clone().unwrap_or_default();

        let row_span = cell.row_span.unwrap_or(1).max(1);
        let column_span = cell.column_span.unwrap_or(1).max(1);
        if row_span > 1 || column_span > 1 {
            merged_cells.push(MergedCell {
                row: cell.row_index,
                column: cell.column_index,
                row_span,
                column_span,
            });
        }
    }

    let mut grid = grid.into_iter();
    let headers: Vec<Vec<String>> = grid.next().into_iter().collect();
    let data_rows: Vec<Vec<String>> = grid.collect();

    let region = raw.bounding_regions.first();

    NormalizedTable {
        page_number: region.map(|r| r.page_number),
        payload: TablePayload {
            headers,
            rows: data_rows,
            bbox: region.and_then(bounding_box),
            confidence: mean_confidence(raw),
            merged_cells,
            row_count: rows,
            column_count: columns,
        },
    }
}

/// Rows and columns of the dense grid, bounded by `MAX_GRID_CELLS`.
fn grid_dimensions(raw: &RawTable) -> (usize, usize) {
    let (rows, columns) = (raw.row_count, raw.column_count);
    let fits = rows <= MAX_GRID_CELLS
        && columns <= MAX_GRID_CELLS
        && rows
            .checked_mul(columns)
            .is_some_and(|cells| cells <= MAX_GRID_CELLS);
    if fits {
        return (rows, columns);
    }

    let used_rows = raw
        .cells
        .iter()
        .map(|c| c.row_index.saturating_add(1))
        .max()
        .unwrap_or(0)
        .min(rows);
    let used_columns = raw
        .cells
        .iter()
        .map(|c| c.column_index.saturating_add(1))
        .max()
        .unwrap_or(0)
        .min(columns);

    let clamped_columns = used_columns.min(MAX_GRID_CELLS);
    let clamped_rows = used_rows.min(MAX_GRID_CELLS / clamped_columns.max(1));
    warn!(
        "Table claims {}x{} grid, clamping to {}x{}",
        rows, columns, clamped_rows, clamped_columns
    );
    (clamped_rows, clamped_columns)
}

/// Axis-aligned box around a region's polygon.
fn bounding_box(region: &RawBoundingRegion) -> Option<BoundingBox> {
    if region.polygon.len() < MIN_POLYGON_SCALARS {
        return None;
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for point in region.polygon.chunks_exact(2) {
        min_x = min_x.min(point[0]);
        max_x = max_x.max(point[0]);
        min_y = min_y.min(point[1]);
        max_y = max_y.max(point[1]);
    }

    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

fn mean_confidence(raw: &RawTable) -> Option<f64> {
    let scores: Vec<f64> = raw.cells.iter().filter_map(|c| c.confidence).collect();
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}
