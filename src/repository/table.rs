//! Parse table repository.
//!
//! Tables are written only by `FileRepository::complete_parse`, inside the
//! transaction that completes the parse. This repository reads them back.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewParseTable, ParseTableRecord};
use super::pool::{DieselError, SqliteConn, SqlitePool};
use crate::models::{ParseTable, TablePayload};
use crate::schema::parse_tables;

/// A normalized table waiting to be persisted.
#[derive(Debug, Clone)]
pub struct ExtractedTableRow {
    pub page_number: Option<i32>,
    pub payload: TablePayload,
}

#[derive(Clone)]
pub struct ParseTableRepository {
    pool: SqlitePool,
}

impl ParseTableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All tables of a file, ordered by page then extraction order.
    pub async fn list_for_file(&self, file_id: i32) -> Result<Vec<ParseTable>, DieselError> {
        let mut conn = self.pool.get().await?;

        parse_tables::table
            .filter(parse_tables::file_id.eq(file_id))
            .order((parse_tables::page_number.asc(), parse_tables::id.asc()))
            .select(ParseTableRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| records.into_iter().map(ParseTable::from).collect())
    }

    /// A single table, only if it belongs to `file_id`.
    pub async fn get_for_file(
        &self,
        file_id: i32,
        table_id: i32,
    ) -> Result<Option<ParseTable>, DieselError> {
        let mut conn = self.pool.get().await?;

        parse_tables::table
            .filter(parse_tables::id.eq(table_id))
            .filter(parse_tables::file_id.eq(file_id))
            .select(ParseTableRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|r| r.map(ParseTable::from))
    }

    pub async fn count_for_file(&self, file_id: i32) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        parse_tables::table
            .filter(parse_tables::file_id.eq(file_id))
            .count()
            .get_result(&mut conn)
            .await
    }
}

/// Drop every table of `file_id` and insert `rows` in order.
///
/// Callers run this inside their own transaction.
pub(super) async fn replace_for_file(
    conn: &mut SqliteConn,
    file_id: i32,
    version_id: i32,
    attempt: i32,
    rows: &[ExtractedTableRow],
    created_at: &str,
) -> Result<usize, DieselError> {
    let removed = diesel::delete(parse_tables::table.filter(parse_tables::file_id.eq(file_id)))
        .execute(conn)
        .await?;
    if removed > 0 {
        tracing::debug!("Superseded {} tables of file {}", removed, file_id);
    }

    for (index, row) in rows.iter().enumerate() {
        let table_json = row.payload.to_json();
        diesel::insert_into(parse_tables::table)
            .values(NewParseTable {
                file_id,
                version_id,
                attempt,
                page_number: row.page_number,
                table_index: index as i32,
                table_json: &table_json,
                confidence: row.payload.confidence,
                created_at,
            })
            .execute(conn)
            .await?;
    }

    Ok(rows.len())
}
