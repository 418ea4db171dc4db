//! Count samples: the size of a member set at a point in time.
//!
//! Append-only; rows are never updated.

use chrono::{DateTime, Utc};
use followtrack_core::{format_stored, CountType, StoredTimestamp};
use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `counts` table with a parsed timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct CountRow {
    pub id: i64,
    pub target_id: i64,
    pub count_type: CountType,
    pub count: i64,
    pub timestamp: DateTime<Utc>,
    pub run_id: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct RawCountRow {
    id: i64,
    target_id: i64,
    count_type: String,
    count: i64,
    timestamp: String,
    run_id: Option<i64>,
}

impl TryFrom<RawCountRow> for CountRow {
    type Error = DbError;

    fn try_from(raw: RawCountRow) -> Result<Self, Self::Error> {
        Ok(CountRow {
            id: raw.id,
            target_id: raw.target_id,
            count_type: raw.count_type.parse()?,
            count: raw.count,
            timestamp: StoredTimestamp::parse(&raw.timestamp)?.to_utc(),
            run_id: raw.run_id,
        })
    }
}

/// Appends one count sample and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_count(
    pool: &SqlitePool,
    target_id: i64,
    count_type: CountType,
    count: i64,
    timestamp: DateTime<Utc>,
    run_id: Option<i64>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO counts (target_id, count_type, count, timestamp, run_id) \
         VALUES (?, ?, ?, ?, ?) \
         RETURNING id",
    )
    .bind(target_id)
    .bind(count_type.as_str())
    .bind(count)
    .bind(format_stored(timestamp))
    .bind(run_id)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Count samples of a target in time order, optionally of one type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_counts(
    pool: &SqlitePool,
    target_id: i64,
    count_type: Option<CountType>,
) -> Result<Vec<CountRow>, DbError> {
    let rows = sqlx::query_as::<_, RawCountRow>(
        "SELECT id, target_id, count_type, count, timestamp, run_id \
         FROM counts \
         WHERE target_id = ?1 AND (?2 IS NULL OR count_type = ?2) \
         ORDER BY julianday(timestamp), id",
    )
    .bind(target_id)
    .bind(count_type.map(CountType::as_str))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CountRow::try_from).collect()
}
