//! The append-only `change_logs` audit table.
//!
//! Entries are keyed by (timestamp, change type, member identifier); writers
//! insert only when that key is absent.

use chrono::{DateTime, Utc};
use followtrack_core::{format_stored, ChangeType, StoredTimestamp};
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

/// A row from the `change_logs` table.
///
/// `change_type` is kept as text; stores written by other tools may carry
/// kinds this crate does not emit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub change_type: String,
    pub username: String,
}

#[derive(Debug, sqlx::FromRow)]
struct RawChangeLogRow {
    id: i64,
    timestamp: String,
    change_type: String,
    username: String,
}

/// Inserts an entry unless one with the same natural key exists.
///
/// Returns `true` when a row was written.
pub(crate) async fn insert_change_log_if_absent(
    conn: &mut SqliteConnection,
    timestamp: DateTime<Utc>,
    change_type: ChangeType,
    username: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO change_logs (timestamp, change_type, username) \
         SELECT ?1, ?2, ?3 \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM change_logs \
             WHERE timestamp = ?1 AND change_type = ?2 AND username = ?3 \
         )",
    )
    .bind(format_stored(timestamp))
    .bind(change_type.as_str())
    .bind(username)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// The most recent `limit` change-log entries, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_change_logs(pool: &SqlitePool, limit: i64) -> Result<Vec<ChangeLogRow>, DbError> {
    let rows = sqlx::query_as::<_, RawChangeLogRow>(
        "SELECT id, timestamp, change_type, username \
         FROM change_logs \
         ORDER BY julianday(timestamp) DESC, id DESC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|raw| -> Result<ChangeLogRow, DbError> {
            Ok(ChangeLogRow {
                id: raw.id,
                timestamp: StoredTimestamp::parse(&raw.timestamp)?.to_utc(),
                change_type: raw.change_type,
                username: raw.username,
            })
        })
        .collect()
}
