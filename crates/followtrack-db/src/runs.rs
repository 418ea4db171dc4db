//! Run Ledger: database operations for `run_history`.
//!
//! One row per poll attempt against one target. Rows start `running` and are
//! finished exactly once as `success` or `failed`. A row left `running` by an
//! interrupted process is never finished; the next run sees it as "no valid
//! previous run".

use chrono::{DateTime, Utc};
use followtrack_core::{format_stored, RunStatus, StoredTimestamp};
use sqlx::SqlitePool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `run_history` table with parsed timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub id: i64,
    pub target_id: i64,
    pub run_started_at: DateTime<Utc>,
    pub run_finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub followers_collected: i64,
    pub followings_collected: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RawRunRow {
    id: i64,
    target_id: i64,
    run_started_at: String,
    run_finished_at: Option<String>,
    status: String,
    followers_collected: i64,
    followings_collected: i64,
}

impl TryFrom<RawRunRow> for RunRow {
    type Error = DbError;

    fn try_from(raw: RawRunRow) -> Result<Self, Self::Error> {
        Ok(RunRow {
            id: raw.id,
            target_id: raw.target_id,
            run_started_at: StoredTimestamp::parse(&raw.run_started_at)?.to_utc(),
            run_finished_at: StoredTimestamp::parse_opt(raw.run_finished_at.as_deref())?
                .map(|ts| ts.to_utc()),
            status: raw.status.parse()?,
            followers_collected: raw.followers_collected,
            followings_collected: raw.followings_collected,
        })
    }
}

/// Members accepted per type during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectedCounts {
    pub followers: i64,
    pub followings: i64,
}

const RUN_COLUMNS: &str = "id, target_id, run_started_at, run_finished_at, status, \
                           followers_collected, followings_collected";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Opens a run for `target_id` in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn start_run(
    pool: &SqlitePool,
    target_id: i64,
    started_at: DateTime<Utc>,
) -> Result<RunRow, DbError> {
    let sql = format!(
        "INSERT INTO run_history (target_id, run_started_at, status) \
         VALUES (?, ?, 'running') \
         RETURNING {RUN_COLUMNS}"
    );
    let raw = sqlx::query_as::<_, RawRunRow>(&sql)
        .bind(target_id)
        .bind(format_stored(started_at))
        .fetch_one(pool)
        .await?;

    RunRow::try_from(raw)
}

/// Marks a run as `success` with its collected counts.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_run(
    pool: &SqlitePool,
    id: i64,
    collected: CollectedCounts,
    finished_at: DateTime<Utc>,
) -> Result<(), DbError> {
    finish_run(pool, id, RunStatus::Success, collected, finished_at).await
}

/// Marks a run as `failed`, keeping whatever counts were collected.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_run(
    pool: &SqlitePool,
    id: i64,
    collected: CollectedCounts,
    finished_at: DateTime<Utc>,
) -> Result<(), DbError> {
    finish_run(pool, id, RunStatus::Failed, collected, finished_at).await
}

async fn finish_run(
    pool: &SqlitePool,
    id: i64,
    status: RunStatus,
    collected: CollectedCounts,
    finished_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE run_history \
         SET status = ?, run_finished_at = ?, followers_collected = ?, followings_collected = ? \
         WHERE id = ? AND status = 'running'",
    )
    .bind(status.as_str())
    .bind(format_stored(finished_at))
    .bind(collected.followers)
    .bind(collected.followings)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches a single run by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_run(pool: &SqlitePool, id: i64) -> Result<RunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM run_history WHERE id = ?");
    let raw = sqlx::query_as::<_, RawRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    RunRow::try_from(raw)
}

/// The most recently started run of a target, whatever its status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn get_last_run(pool: &SqlitePool, target_id: i64) -> Result<Option<RunRow>, DbError> {
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM run_history \
         WHERE target_id = ? \
         ORDER BY julianday(run_started_at) DESC, id DESC \
         LIMIT 1"
    );
    sqlx::query_as::<_, RawRunRow>(&sql)
        .bind(target_id)
        .fetch_optional(pool)
        .await?
        .map(RunRow::try_from)
        .transpose()
}

/// Lower bound for interpolating the join time of members first seen in a
/// run starting at `before`.
///
/// Only the immediately preceding run counts, and only if it finished with
/// `success`. An interrupted (`running`) or `failed` predecessor yields
/// `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn previous_run_started_at(
    pool: &SqlitePool,
    target_id: i64,
    before: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM run_history \
         WHERE target_id = ? AND julianday(run_started_at) < julianday(?) \
         ORDER BY julianday(run_started_at) DESC, id DESC \
         LIMIT 1"
    );
    let previous = sqlx::query_as::<_, RawRunRow>(&sql)
        .bind(target_id)
        .bind(format_stored(before))
        .fetch_optional(pool)
        .await?
        .map(RunRow::try_from)
        .transpose()?;

    Ok(previous
        .filter(|run| run.status == RunStatus::Success)
        .map(|run| run.run_started_at))
}

/// Returns the most recent `limit` runs, optionally for one target.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_runs(
    pool: &SqlitePool,
    target_id: Option<i64>,
    limit: i64,
) -> Result<Vec<RunRow>, DbError> {
    let sql = format!(
        "SELECT {RUN_COLUMNS} FROM run_history \
         WHERE (?1 IS NULL OR target_id = ?1) \
         ORDER BY julianday(run_started_at) DESC, id DESC \
         LIMIT ?2"
    );
    let rows = sqlx::query_as::<_, RawRunRow>(&sql)
        .bind(target_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(RunRow::try_from).collect()
}
