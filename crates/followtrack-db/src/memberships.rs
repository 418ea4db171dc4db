//! Database operations for `followers_followings`, one row per
//! (target, member, type) timeline.

use chrono::{DateTime, Utc};
use followtrack_core::{ExistingMember, MemberType, MembershipTimeline, StoredTimestamp};
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A membership row joined with its target's username.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipRow {
    pub id: i64,
    pub target_id: i64,
    pub target_username: String,
    pub member: String,
    pub member_type: MemberType,
    pub added_at: DateTime<Utc>,
    pub is_lost: bool,
    pub lost_at: Option<DateTime<Utc>>,
    pub first_seen_run_at: Option<DateTime<Utc>>,
    pub last_seen_run_at: Option<DateTime<Utc>>,
    pub lost_at_run_at: Option<DateTime<Utc>>,
    pub estimated_added_at: Option<DateTime<Utc>>,
    pub estimated_removed_at: Option<DateTime<Utc>>,
}

impl MembershipRow {
    #[must_use]
    pub fn timeline(&self) -> MembershipTimeline {
        MembershipTimeline {
            added_at: self.added_at,
            is_lost: self.is_lost,
            lost_at: self.lost_at,
            first_seen_run_at: self.first_seen_run_at,
            last_seen_run_at: self.last_seen_run_at,
            lost_at_run_at: self.lost_at_run_at,
            estimated_added_at: self.estimated_added_at,
            estimated_removed_at: self.estimated_removed_at,
        }
    }
}

/// Timestamps stay as stored text until parsed; legacy stores mix layouts.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RawMembershipRow {
    pub id: i64,
    pub target_id: i64,
    pub target_username: String,
    pub follower_following_username: String,
    pub is_follower: bool,
    pub added_at: String,
    pub is_lost: bool,
    pub lost_at: Option<String>,
    pub first_seen_run_at: Option<String>,
    pub last_seen_run_at: Option<String>,
    pub lost_at_run_at: Option<String>,
    pub estimated_added_at: Option<String>,
    pub estimated_removed_at: Option<String>,
}

fn parse_utc(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, DbError> {
    Ok(StoredTimestamp::parse_opt(raw)?.map(|ts| ts.to_utc()))
}

impl TryFrom<RawMembershipRow> for MembershipRow {
    type Error = DbError;

    fn try_from(raw: RawMembershipRow) -> Result<Self, Self::Error> {
        Ok(MembershipRow {
            id: raw.id,
            target_id: raw.target_id,
            added_at: StoredTimestamp::parse(&raw.added_at)?.to_utc(),
            is_lost: raw.is_lost,
            lost_at: parse_utc(raw.lost_at.as_deref())?,
            first_seen_run_at: parse_utc(raw.first_seen_run_at.as_deref())?,
            last_seen_run_at: parse_utc(raw.last_seen_run_at.as_deref())?,
            lost_at_run_at: parse_utc(raw.lost_at_run_at.as_deref())?,
            estimated_added_at: parse_utc(raw.estimated_added_at.as_deref())?,
            estimated_removed_at: parse_utc(raw.estimated_removed_at.as_deref())?,
            member_type: MemberType::from_is_follower(raw.is_follower),
            member: raw.follower_following_username,
            target_username: raw.target_username,
        })
    }
}

impl TryFrom<&RawMembershipRow> for ExistingMember {
    type Error = DbError;

    fn try_from(raw: &RawMembershipRow) -> Result<Self, Self::Error> {
        Ok(ExistingMember {
            member: raw.follower_following_username.clone(),
            is_lost: raw.is_lost,
            added_at: StoredTimestamp::parse(&raw.added_at)?,
            first_seen_run_at: StoredTimestamp::parse_opt(raw.first_seen_run_at.as_deref())?,
            last_seen_run_at: StoredTimestamp::parse_opt(raw.last_seen_run_at.as_deref())?,
        })
    }
}

/// Column list for [`RawMembershipRow`]; callers alias the tables as
/// `ff` and `t` and may prefix them with a schema.
pub(crate) const MEMBERSHIP_COLUMNS: &str = "ff.id, ff.target_id, t.username AS target_username, \
     ff.follower_following_username, ff.is_follower, ff.added_at, ff.is_lost, ff.lost_at, \
     ff.first_seen_run_at, ff.last_seen_run_at, ff.lost_at_run_at, \
     ff.estimated_added_at, ff.estimated_removed_at";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Stored timelines for one (target, type), split by whether they parse.
#[derive(Debug, Default)]
pub(crate) struct ExistingMembers {
    pub readable: Vec<ExistingMember>,
    /// Members whose row carries a timestamp that cannot be parsed.
    pub unreadable: Vec<String>,
}

/// Every stored timeline for (target, type), as the reconciler sees them.
///
/// A row with an unparseable timestamp is logged and set aside rather than
/// failing the whole pass.
pub(crate) async fn load_existing_members(
    conn: &mut SqliteConnection,
    target_id: i64,
    member_type: MemberType,
) -> Result<ExistingMembers, DbError> {
    let sql = format!(
        "SELECT {MEMBERSHIP_COLUMNS} \
         FROM followers_followings ff JOIN targets t ON t.id = ff.target_id \
         WHERE ff.target_id = ? AND ff.is_follower = ?"
    );
    let rows = sqlx::query_as::<_, RawMembershipRow>(&sql)
        .bind(target_id)
        .bind(member_type.is_follower())
        .fetch_all(&mut *conn)
        .await?;

    let mut loaded = ExistingMembers::default();
    for raw in rows {
        match ExistingMember::try_from(&raw) {
            Ok(member) => loaded.readable.push(member),
            Err(err) => {
                tracing::warn!(
                    target_id,
                    row_id = raw.id,
                    member = %raw.follower_following_username,
                    error = %err,
                    "skipping membership row with unreadable timestamp"
                );
                loaded.unreadable.push(raw.follower_following_username);
            }
        }
    }
    Ok(loaded)
}

/// Fetches one member's timeline.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the member was never seen for this
/// target and type, [`DbError::Sqlx`] if the query fails, or
/// [`DbError::Core`] if a stored value cannot be parsed.
pub async fn get_membership(
    pool: &SqlitePool,
    target_id: i64,
    member: &str,
    member_type: MemberType,
) -> Result<MembershipRow, DbError> {
    let sql = format!(
        "SELECT {MEMBERSHIP_COLUMNS} \
         FROM followers_followings ff JOIN targets t ON t.id = ff.target_id \
         WHERE ff.target_id = ? AND ff.follower_following_username = ? AND ff.is_follower = ?"
    );
    let raw = sqlx::query_as::<_, RawMembershipRow>(&sql)
        .bind(target_id)
        .bind(member)
        .bind(member_type.is_follower())
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    MembershipRow::try_from(raw)
}

/// Every timeline of one type for a target, active and lost, by member.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Core`] if a
/// stored value cannot be parsed.
pub async fn list_memberships(
    pool: &SqlitePool,
    target_id: i64,
    member_type: MemberType,
) -> Result<Vec<MembershipRow>, DbError> {
    let sql = format!(
        "SELECT {MEMBERSHIP_COLUMNS} \
         FROM followers_followings ff JOIN targets t ON t.id = ff.target_id \
         WHERE ff.target_id = ? AND ff.is_follower = ? \
         ORDER BY ff.follower_following_username"
    );
    let rows = sqlx::query_as::<_, RawMembershipRow>(&sql)
        .bind(target_id)
        .bind(member_type.is_follower())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(MembershipRow::try_from).collect()
}
