//! Repository utilities.

use diesel::result::DatabaseErrorInformation;
use diesel::sql_types::BigInt;
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;

use super::pool::{DieselError, SqliteConn};

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

/// Row id of the last insert on a connection.
#[derive(QueryableByName)]
pub struct LastInsertRowId {
    #[diesel(sql_type = BigInt, column_name = "last_insert_rowid()")]
    pub id: i64,
}

/// Id of the row just inserted on `conn`.
pub async fn last_insert_id(conn: &mut SqliteConn) -> Result<i32, DieselError> {
    diesel::sql_query("SELECT last_insert_rowid()")
        .get_result::<LastInsertRowId>(conn)
        .await
        .map(|r| r.id as i32)
}

/// Current time as stored in text timestamp columns.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
