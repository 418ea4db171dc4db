use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};
use followtrack_core::{format_stored, MemberType};
use followtrack_db::{DailyChangeSummary, MemberQuery, MembershipRow};
use serde::Serialize;

use super::fmt_time;

/// One row of `report list --out-json`.
#[derive(Debug, Serialize)]
struct MemberRecord<'a> {
    target: &'a str,
    username: &'a str,
    #[serde(rename = "type")]
    member_type: MemberType,
    first_seen_run_at: Option<String>,
    last_seen_run_at: Option<String>,
}

impl<'a> From<&'a MembershipRow> for MemberRecord<'a> {
    fn from(row: &'a MembershipRow) -> Self {
        Self {
            target: &row.target_username,
            username: &row.member,
            member_type: row.member_type,
            first_seen_run_at: row.first_seen_run_at.map(format_stored),
            last_seen_run_at: row.last_seen_run_at.map(format_stored),
        }
    }
}

fn print_members<F>(rows: &[MembershipRow], when_a: &str, when_b: &str, columns: F)
where
    F: Fn(&MembershipRow) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
{
    println!(
        "{:<20}{:<28}{:<11}{:<21}{}",
        "TARGET",
        "USERNAME",
        "TYPE",
        when_a.to_uppercase(),
        when_b.to_uppercase()
    );
    for row in rows {
        let (a, b) = columns(row);
        println!(
            "{:<20}{:<28}{:<11}{:<21}{}",
            row.target_username,
            row.member,
            row.member_type.as_str(),
            fmt_time(a),
            fmt_time(b)
        );
    }
    println!("{} row(s)", rows.len());
}

/// Current members, optionally saved as JSON.
///
/// # Errors
///
/// Returns an error if the query fails or the JSON file cannot be written.
pub(crate) async fn run_list(
    pool: &sqlx::SqlitePool,
    target: Option<&str>,
    member_type: Option<MemberType>,
    out_json: Option<&Path>,
) -> anyhow::Result<()> {
    let rows =
        followtrack_db::list_current_members(pool, MemberQuery::new(target, member_type)).await?;

    println!("Current followers/followings");
    print_members(&rows, "first_seen", "last_seen", |r| {
        (r.first_seen_run_at, r.last_seen_run_at)
    });

    if let Some(path) = out_json {
        let records: Vec<MemberRecord<'_>> = rows.iter().map(MemberRecord::from).collect();
        let body = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(path, body).await?;
        println!("Saved JSON to {}", path.display());
    }
    Ok(())
}

pub(crate) async fn run_new(
    pool: &sqlx::SqlitePool,
    target: Option<&str>,
    member_type: Option<MemberType>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut rows = followtrack_db::list_first_seen_between(
        pool,
        MemberQuery::new(target, member_type),
        from,
        to,
    )
    .await?;
    // Oldest first, as a timeline reads.
    rows.reverse();

    println!("New followers/followings");
    print_members(&rows, "first_seen", "estimated_added", |r| {
        (r.first_seen_run_at.or(Some(r.added_at)), r.estimated_added_at)
    });
    Ok(())
}

pub(crate) async fn run_lost(
    pool: &sqlx::SqlitePool,
    target: Option<&str>,
    member_type: Option<MemberType>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut rows =
        followtrack_db::list_lost_between(pool, MemberQuery::new(target, member_type), from, to)
            .await?;
    rows.reverse();

    println!("Lost followers/followings");
    print_members(&rows, "lost_at_run", "estimated_removed", |r| {
        (r.lost_at_run_at, r.estimated_removed_at)
    });
    Ok(())
}

pub(crate) async fn run_snapshot(
    pool: &sqlx::SqlitePool,
    target: Option<&str>,
    member_type: Option<MemberType>,
    at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let rows =
        followtrack_db::snapshot_at(pool, MemberQuery::new(target, member_type), at).await?;

    println!("Snapshot @ {}", format_stored(at));
    print_members(&rows, "first_seen", "last_seen", |r| {
        (r.first_seen_run_at.or(Some(r.added_at)), r.last_seen_run_at)
    });
    Ok(())
}

/// Per-day counts for the last `days` days, including days with no change.
pub(crate) async fn run_summary(
    pool: &sqlx::SqlitePool,
    target: Option<&str>,
    days: u32,
) -> anyhow::Result<()> {
    let until = Utc::now();
    let since = until - TimeDelta::days(i64::from(days));
    let changes = followtrack_db::daily_summary(pool, target, since, until).await?;
    let buckets = fill_days(since.date_naive(), until.date_naive(), &changes);

    println!("Summary last {days} days");
    println!(
        "{:<12}{:>15}{:>16}{:>16}{:>17}",
        "DATE", "NEW_FOLLOWERS", "NEW_FOLLOWINGS", "LOST_FOLLOWERS", "LOST_FOLLOWINGS"
    );
    for (day, c) in &buckets {
        println!(
            "{:<12}{:>15}{:>16}{:>16}{:>17}",
            day.format("%Y-%m-%d").to_string(),
            c.followers_gained,
            c.followings_added,
            c.followers_lost,
            c.followings_removed
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DayCounts {
    followers_gained: i64,
    followers_lost: i64,
    followings_added: i64,
    followings_removed: i64,
}

/// One bucket per calendar day in `[since, until]`, zeros where nothing
/// changed. Rows outside the range are ignored.
fn fill_days(
    since: NaiveDate,
    until: NaiveDate,
    changes: &[DailyChangeSummary],
) -> BTreeMap<NaiveDate, DayCounts> {
    let mut buckets = BTreeMap::new();
    let mut day = since;
    while day <= until {
        buckets.insert(day, DayCounts::default());
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }

    for change in changes {
        let Some(bucket) = change.date().and_then(|d| buckets.get_mut(&d)) else {
            tracing::debug!(day = %change.day, "summary row outside requested range");
            continue;
        };
        bucket.followers_gained += change.followers_gained;
        bucket.followers_lost += change.followers_lost;
        bucket.followings_added += change.followings_added;
        bucket.followings_removed += change.followings_removed;
    }
    buckets
}
