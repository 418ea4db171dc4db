//! Read-only queries over stored timelines, used by reporting.
//!
//! Range bounds are inclusive. Comparisons go through `julianday()` so stores
//! holding a mix of RFC 3339 and legacy naive text still order correctly.

use chrono::{DateTime, NaiveDate, Utc};
use followtrack_core::{format_stored, MemberType};
use sqlx::SqlitePool;

use crate::memberships::{MembershipRow, RawMembershipRow, MEMBERSHIP_COLUMNS};
use crate::DbError;

/// Narrows a query to one target and/or one member type.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberQuery<'a> {
    pub target: Option<&'a str>,
    pub member_type: Option<MemberType>,
}

impl<'a> MemberQuery<'a> {
    #[must_use]
    pub fn new(target: Option<&'a str>, member_type: Option<MemberType>) -> Self {
        Self {
            target,
            member_type,
        }
    }
}

/// Gains and losses on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DailyChangeSummary {
    pub day: String,
    pub followers_gained: i64,
    pub followers_lost: i64,
    pub followings_added: i64,
    pub followings_removed: i64,
}

impl DailyChangeSummary {
    /// The bucket's calendar date, if the stored day text is well formed.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.day, "%Y-%m-%d").ok()
    }
}

async fn fetch_members(
    pool: &SqlitePool,
    query: MemberQuery<'_>,
    condition: &str,
    order: &str,
    bounds: &[String],
) -> Result<Vec<MembershipRow>, DbError> {
    let sql = format!(
        "SELECT {MEMBERSHIP_COLUMNS} \
         FROM followers_followings ff JOIN targets t ON t.id = ff.target_id \
         WHERE (?1 IS NULL OR t.username = ?1) \
           AND (?2 IS NULL OR ff.is_follower = ?2) \
           AND {condition} \
         ORDER BY {order}"
    );

    let mut q = sqlx::query_as::<_, RawMembershipRow>(&sql)
        .bind(query.target)
        .bind(query.member_type.map(MemberType::is_follower));
    for bound in bounds {
        q = q.bind(bound);
    }

    let rows = q.fetch_all(pool).await?;
    rows.into_iter().map(MembershipRow::try_from).collect()
}

/// Members currently present (`is_lost = false`).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_current_members(
    pool: &SqlitePool,
    query: MemberQuery<'_>,
) -> Result<Vec<MembershipRow>, DbError> {
    fetch_members(
        pool,
        query,
        "ff.is_lost = 0",
        "t.username, ff.is_follower DESC, ff.follower_following_username",
        &[],
    )
    .await
}

/// Members whose first sighting falls within `[from, to]`.
///
/// Rows written before `first_seen_run_at` existed fall back to `added_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_first_seen_between(
    pool: &SqlitePool,
    query: MemberQuery<'_>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<MembershipRow>, DbError> {
    fetch_members(
        pool,
        query,
        "julianday(COALESCE(ff.first_seen_run_at, ff.added_at)) BETWEEN julianday(?3) AND julianday(?4)",
        "julianday(COALESCE(ff.first_seen_run_at, ff.added_at)) DESC, ff.follower_following_username",
        &[format_stored(from), format_stored(to)],
    )
    .await
}

/// Members last confirmed present within `[from, to]`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_last_seen_between(
    pool: &SqlitePool,
    query: MemberQuery<'_>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<MembershipRow>, DbError> {
    fetch_members(
        pool,
        query,
        "julianday(ff.last_seen_run_at) BETWEEN julianday(?3) AND julianday(?4)",
        "julianday(ff.last_seen_run_at) DESC, ff.follower_following_username",
        &[format_stored(from), format_stored(to)],
    )
    .await
}

/// Members confirmed lost by a run within `[from, to]`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_lost_between(
    pool: &SqlitePool,
    query: MemberQuery<'_>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<MembershipRow>, DbError> {
    fetch_members(
        pool,
        query,
        "ff.is_lost = 1 AND julianday(ff.lost_at_run_at) BETWEEN julianday(?3) AND julianday(?4)",
        "julianday(ff.lost_at_run_at) DESC, ff.follower_following_username",
        &[format_stored(from), format_stored(to)],
    )
    .await
}

/// Reconstruct the member set as it stood at `at`.
///
/// A member counts when it was first seen at or before `at` and was not yet
/// lost: `first_seen_run_at <= at < lost_at_run_at`, or no loss recorded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn snapshot_at(
    pool: &SqlitePool,
    query: MemberQuery<'_>,
    at: DateTime<Utc>,
) -> Result<Vec<MembershipRow>, DbError> {
    fetch_members(
        pool,
        query,
        "julianday(COALESCE(ff.first_seen_run_at, ff.added_at)) <= julianday(?3) \
         AND (ff.lost_at_run_at IS NULL OR julianday(ff.lost_at_run_at) > julianday(?3))",
        "t.username, ff.is_follower DESC, ff.follower_following_username",
        &[format_stored(at)],
    )
    .await
}

/// Daily gained/lost counts for each day in `[since, until]` that had any
/// change, oldest first.
///
/// Gains are bucketed by first sighting and losses by the run that confirmed
/// them.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn daily_summary(
    pool: &SqlitePool,
    target: Option<&str>,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<DailyChangeSummary>, DbError> {
    let rows = sqlx::query_as::<_, DailyChangeSummary>(
        "WITH events AS ( \
             SELECT date(COALESCE(ff.first_seen_run_at, ff.added_at)) AS day, \
                    ff.is_follower AS is_follower, 0 AS lost \
             FROM followers_followings ff JOIN targets t ON t.id = ff.target_id \
             WHERE (?1 IS NULL OR t.username = ?1) \
               AND julianday(COALESCE(ff.first_seen_run_at, ff.added_at)) \
                   BETWEEN julianday(?2) AND julianday(?3) \
             UNION ALL \
             SELECT date(ff.lost_at_run_at), ff.is_follower, 1 \
             FROM followers_followings ff JOIN targets t ON t.id = ff.target_id \
             WHERE (?1 IS NULL OR t.username = ?1) \
               AND ff.is_lost = 1 \
               AND julianday(ff.lost_at_run_at) BETWEEN julianday(?2) AND julianday(?3) \
         ) \
         SELECT day, \
                SUM(CASE WHEN is_follower = 1 AND lost = 0 THEN 1 ELSE 0 END) AS followers_gained, \
                SUM(CASE WHEN is_follower = 1 AND lost = 1 THEN 1 ELSE 0 END) AS followers_lost, \
                SUM(CASE WHEN is_follower = 0 AND lost = 0 THEN 1 ELSE 0 END) AS followings_added, \
                SUM(CASE WHEN is_follower = 0 AND lost = 1 THEN 1 ELSE 0 END) AS followings_removed \
         FROM events \
         GROUP BY day \
         ORDER BY day",
    )
    .bind(target)
    .bind(format_stored(since))
    .bind(format_stored(until))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
