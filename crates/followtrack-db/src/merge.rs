//! Merge Engine: fold one timeline store into another.
//!
//! Both stores are read through a single connection to the destination with
//! the source `ATTACH`ed as `srcdb`. A [`MergePlan`] is computed in memory
//! from both sides, keyed by natural keys (target name, run start, member
//! identifier) since row ids are not portable between stores. Preview and
//! merge share that plan, so a preview reports exactly what a merge would do.
//!
//! Rules:
//! - targets: insert if absent by username.
//! - runs: insert if absent by (target, `run_started_at`); never updated.
//! - memberships: source rows are grouped by (target, member, type) and
//!   folded with [`MembershipTimeline::aggregate`], then combined with the
//!   destination row if any. A destination row is rewritten only when the
//!   combined timeline differs from it.
//! - counts: insert if absent by (target, type, timestamp), re-linked to the
//!   destination run with the same (target, `run_started_at`).
//! - change logs: insert if absent by (timestamp, type, member).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use followtrack_core::{format_stored, MembershipTimeline, StoredTimestamp};
use sqlx::sqlite::{SqliteConnection, SqliteLockingMode};
use sqlx::Connection;

use crate::maintenance::create_backup;
use crate::memberships::{MembershipRow, RawMembershipRow, MEMBERSHIP_COLUMNS};
use crate::{connect_options, ensure_store_exists, run_migrations_on, verify_store_tables, DbError};

const DEST_SCHEMA: &str = "main";
const SRC_SCHEMA: &str = "srcdb";

/// Rows a merge inserted or updated, per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub targets_inserted: usize,
    pub runs_inserted: usize,
    pub membership_inserted: usize,
    pub membership_updated: usize,
    pub counts_inserted: usize,
    pub change_log_inserted: usize,
    /// Copy of the destination taken before the merge committed.
    pub backup_path: Option<PathBuf>,
}

impl MergeReport {
    /// `true` when the merge changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.targets_inserted == 0
            && self.runs_inserted == 0
            && self.membership_inserted == 0
            && self.membership_updated == 0
            && self.counts_inserted == 0
            && self.change_log_inserted == 0
    }
}

// ---------------------------------------------------------------------------
// Loaded store contents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RunRecord {
    target: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    followers_collected: i64,
    followings_collected: i64,
}

#[derive(Debug, Clone)]
struct MembershipRecord {
    id: i64,
    target: String,
    member: String,
    is_follower: bool,
    timeline: MembershipTimeline,
}

#[derive(Debug, Clone)]
struct CountRecord {
    target: String,
    count_type: String,
    count: i64,
    timestamp: DateTime<Utc>,
    run_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct ChangeLogRecord {
    timestamp: DateTime<Utc>,
    change_type: String,
    username: String,
}

#[derive(Debug, Default)]
struct StoreContents {
    targets: Vec<String>,
    runs: Vec<RunRecord>,
    memberships: Vec<MembershipRecord>,
    counts: Vec<CountRecord>,
    change_logs: Vec<ChangeLogRecord>,
}

#[derive(Debug, sqlx::FromRow)]
struct RawRunRecord {
    target: String,
    run_started_at: String,
    run_finished_at: Option<String>,
    status: String,
    followers_collected: i64,
    followings_collected: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RawCountRecord {
    target: String,
    count_type: String,
    count: i64,
    timestamp: String,
    run_started_at: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct RawChangeLogRecord {
    timestamp: String,
    change_type: String,
    username: String,
}

fn parse_utc(raw: &str) -> Result<DateTime<Utc>, DbError> {
    Ok(StoredTimestamp::parse(raw)?.to_utc())
}

fn parse_utc_opt(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, DbError> {
    Ok(StoredTimestamp::parse_opt(raw)?.map(|ts| ts.to_utc()))
}

async fn load_contents(
    conn: &mut SqliteConnection,
    schema: &str,
) -> Result<StoreContents, DbError> {
    let targets: Vec<String> =
        sqlx::query_scalar(&format!("SELECT username FROM {schema}.targets ORDER BY id"))
            .fetch_all(&mut *conn)
            .await?;

    let raw_runs = sqlx::query_as::<_, RawRunRecord>(&format!(
        "SELECT t.username AS target, r.run_started_at, r.run_finished_at, r.status, \
                r.followers_collected, r.followings_collected \
         FROM {schema}.run_history r JOIN {schema}.targets t ON t.id = r.target_id \
         ORDER BY r.id"
    ))
    .fetch_all(&mut *conn)
    .await?;
    let runs = raw_runs
        .into_iter()
        .map(|raw| -> Result<RunRecord, DbError> {
            Ok(RunRecord {
                target: raw.target,
                started_at: parse_utc(&raw.run_started_at)?,
                finished_at: parse_utc_opt(raw.run_finished_at.as_deref())?,
                status: raw.status,
                followers_collected: raw.followers_collected,
                followings_collected: raw.followings_collected,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let raw_memberships = sqlx::query_as::<_, RawMembershipRow>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS} \
         FROM {schema}.followers_followings ff JOIN {schema}.targets t ON t.id = ff.target_id \
         ORDER BY ff.id"
    ))
    .fetch_all(&mut *conn)
    .await?;
    let memberships = raw_memberships
        .into_iter()
        .map(|raw| -> Result<MembershipRecord, DbError> {
            let row = MembershipRow::try_from(raw)?;
            Ok(MembershipRecord {
                id: row.id,
                timeline: row.timeline(),
                is_follower: row.member_type.is_follower(),
                target: row.target_username,
                member: row.member,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let raw_counts = sqlx::query_as::<_, RawCountRecord>(&format!(
        "SELECT t.username AS target, c.count_type, c.count, c.timestamp, \
                r.run_started_at AS run_started_at \
         FROM {schema}.counts c \
         JOIN {schema}.targets t ON t.id = c.target_id \
         LEFT JOIN {schema}.run_history r ON r.id = c.run_id \
         ORDER BY c.id"
    ))
    .fetch_all(&mut *conn)
    .await?;
    let counts = raw_counts
        .into_iter()
        .map(|raw| -> Result<CountRecord, DbError> {
            Ok(CountRecord {
                target: raw.target,
                count_type: raw.count_type,
                count: raw.count,
                timestamp: parse_utc(&raw.timestamp)?,
                run_started_at: parse_utc_opt(raw.run_started_at.as_deref())?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let raw_logs = sqlx::query_as::<_, RawChangeLogRecord>(&format!(
        "SELECT timestamp, change_type, username FROM {schema}.change_logs ORDER BY id"
    ))
    .fetch_all(&mut *conn)
    .await?;
    let change_logs = raw_logs
        .into_iter()
        .map(|raw| -> Result<ChangeLogRecord, DbError> {
            Ok(ChangeLogRecord {
                timestamp: parse_utc(&raw.timestamp)?,
                change_type: raw.change_type,
                username: raw.username,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StoreContents {
        targets,
        runs,
        memberships,
        counts,
        change_logs,
    })
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

type MemberKey = (String, String, bool);

#[derive(Debug, Default)]
struct MergePlan {
    new_targets: Vec<String>,
    new_runs: Vec<RunRecord>,
    membership_inserts: Vec<(MemberKey, MembershipTimeline)>,
    membership_updates: Vec<(i64, MembershipTimeline)>,
    new_counts: Vec<CountRecord>,
    new_change_logs: Vec<ChangeLogRecord>,
}

impl MergePlan {
    fn report(&self) -> MergeReport {
        MergeReport {
            targets_inserted: self.new_targets.len(),
            runs_inserted: self.new_runs.len(),
            membership_inserted: self.membership_inserts.len(),
            membership_updated: self.membership_updates.len(),
            counts_inserted: self.new_counts.len(),
            change_log_inserted: self.new_change_logs.len(),
            backup_path: None,
        }
    }
}

fn plan_merge(dest: &StoreContents, src: &StoreContents) -> MergePlan {
    let mut plan = MergePlan::default();

    let mut known_targets: HashSet<&str> = dest.targets.iter().map(String::as_str).collect();
    for target in &src.targets {
        if known_targets.insert(target.as_str()) {
            plan.new_targets.push(target.clone());
        }
    }

    let mut known_runs: HashSet<(&str, DateTime<Utc>)> = dest
        .runs
        .iter()
        .map(|run| (run.target.as_str(), run.started_at))
        .collect();
    for run in &src.runs {
        if known_runs.insert((run.target.as_str(), run.started_at)) {
            plan.new_runs.push(run.clone());
        }
    }

    let mut src_groups: BTreeMap<MemberKey, Vec<MembershipTimeline>> = BTreeMap::new();
    for record in &src.memberships {
        src_groups
            .entry((record.target.clone(), record.member.clone(), record.is_follower))
            .or_default()
            .push(record.timeline);
    }

    // Duplicate destination rows for one key fold into the earliest-seen one,
    // the same way the schema upgrade folds them before a merge writes.
    let mut dest_rows: HashMap<MemberKey, (&MembershipRecord, MembershipTimeline)> =
        HashMap::new();
    for record in &dest.memberships {
        let key = (record.target.clone(), record.member.clone(), record.is_follower);
        dest_rows
            .entry(key)
            .and_modify(|(kept, folded)| {
                *folded = folded.combine(&record.timeline);
                if first_seen(record) < first_seen(kept) {
                    *kept = record;
                }
            })
            .or_insert((record, record.timeline));
    }

    for (key, timelines) in src_groups {
        let Some(aggregate) = MembershipTimeline::aggregate(&timelines) else {
            continue;
        };
        match dest_rows.get(&key) {
            Some((kept, existing)) => {
                let merged = existing.combine(&aggregate);
                if merged != *existing {
                    plan.membership_updates.push((kept.id, merged));
                }
            }
            None => plan.membership_inserts.push((key, aggregate)),
        }
    }

    let mut known_counts: HashSet<(&str, &str, DateTime<Utc>)> = dest
        .counts
        .iter()
        .map(|c| (c.target.as_str(), c.count_type.as_str(), c.timestamp))
        .collect();
    for count in &src.counts {
        if known_counts.insert((count.target.as_str(), count.count_type.as_str(), count.timestamp)) {
            plan.new_counts.push(count.clone());
        }
    }

    let mut known_logs: HashSet<(DateTime<Utc>, &str, &str)> = dest
        .change_logs
        .iter()
        .map(|log| (log.timestamp, log.change_type.as_str(), log.username.as_str()))
        .collect();
    for log in &src.change_logs {
        if known_logs.insert((log.timestamp, log.change_type.as_str(), log.username.as_str())) {
            plan.new_change_logs.push(log.clone());
        }
    }

    plan
}

fn first_seen(record: &MembershipRecord) -> DateTime<Utc> {
    record
        .timeline
        .first_seen_run_at
        .unwrap_or(record.timeline.added_at)
}

// ---------------------------------------------------------------------------
// Applying
// ---------------------------------------------------------------------------

async fn dest_target_ids(conn: &mut SqliteConnection) -> Result<HashMap<String, i64>, DbError> {
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, username FROM main.targets")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(id, username)| (username, id)).collect())
}

async fn dest_run_ids(
    conn: &mut SqliteConnection,
) -> Result<HashMap<(i64, DateTime<Utc>), i64>, DbError> {
    let rows: Vec<(i64, i64, String)> =
        sqlx::query_as("SELECT id, target_id, run_started_at FROM main.run_history")
            .fetch_all(&mut *conn)
            .await?;

    let mut ids = HashMap::with_capacity(rows.len());
    for (id, target_id, started) in rows {
        ids.entry((target_id, parse_utc(&started)?)).or_insert(id);
    }
    Ok(ids)
}

fn target_id(ids: &HashMap<String, i64>, username: &str) -> Result<i64, DbError> {
    ids.get(username).copied().ok_or(DbError::NotFound)
}

async fn apply_plan(conn: &mut SqliteConnection, plan: &MergePlan) -> Result<(), DbError> {
    for username in &plan.new_targets {
        sqlx::query("INSERT INTO main.targets (username) VALUES (?)")
            .bind(username)
            .execute(&mut *conn)
            .await?;
    }
    let target_ids = dest_target_ids(conn).await?;

    for run in &plan.new_runs {
        sqlx::query(
            "INSERT INTO main.run_history \
             (target_id, run_started_at, run_finished_at, status, \
              followers_collected, followings_collected) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(target_id(&target_ids, &run.target)?)
        .bind(format_stored(run.started_at))
        .bind(run.finished_at.map(format_stored))
        .bind(&run.status)
        .bind(run.followers_collected)
        .bind(run.followings_collected)
        .execute(&mut *conn)
        .await?;
    }

    for ((target, member, is_follower), timeline) in &plan.membership_inserts {
        sqlx::query(
            "INSERT INTO main.followers_followings \
             (target_id, follower_following_username, is_follower, added_at, is_lost, lost_at, \
              first_seen_run_at, last_seen_run_at, lost_at_run_at, \
              estimated_added_at, estimated_removed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(target_id(&target_ids, target)?)
        .bind(member)
        .bind(is_follower)
        .bind(format_stored(timeline.added_at))
        .bind(timeline.is_lost)
        .bind(timeline.lost_at.map(format_stored))
        .bind(timeline.first_seen_run_at.map(format_stored))
        .bind(timeline.last_seen_run_at.map(format_stored))
        .bind(timeline.lost_at_run_at.map(format_stored))
        .bind(timeline.estimated_added_at.map(format_stored))
        .bind(timeline.estimated_removed_at.map(format_stored))
        .execute(&mut *conn)
        .await?;
    }

    for (id, timeline) in &plan.membership_updates {
        sqlx::query(
            "UPDATE main.followers_followings \
             SET added_at = ?, is_lost = ?, lost_at = ?, first_seen_run_at = ?, \
                 last_seen_run_at = ?, lost_at_run_at = ?, estimated_added_at = ?, \
                 estimated_removed_at = ? \
             WHERE id = ?",
        )
        .bind(format_stored(timeline.added_at))
        .bind(timeline.is_lost)
        .bind(timeline.lost_at.map(format_stored))
        .bind(timeline.first_seen_run_at.map(format_stored))
        .bind(timeline.last_seen_run_at.map(format_stored))
        .bind(timeline.lost_at_run_at.map(format_stored))
        .bind(timeline.estimated_added_at.map(format_stored))
        .bind(timeline.estimated_removed_at.map(format_stored))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    let run_ids = dest_run_ids(conn).await?;
    for count in &plan.new_counts {
        let dest_target = target_id(&target_ids, &count.target)?;
        let run_id = count
            .run_started_at
            .and_then(|started| run_ids.get(&(dest_target, started)).copied());
        sqlx::query(
            "INSERT INTO main.counts (target_id, count_type, count, timestamp, run_id) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(dest_target)
        .bind(&count.count_type)
        .bind(count.count)
        .bind(format_stored(count.timestamp))
        .bind(run_id)
        .execute(&mut *conn)
        .await?;
    }

    for log in &plan.new_change_logs {
        sqlx::query("INSERT INTO main.change_logs (timestamp, change_type, username) VALUES (?, ?, ?)")
            .bind(format_stored(log.timestamp))
            .bind(&log.change_type)
            .bind(&log.username)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

fn check_pair(dest: &Path, src: &Path) -> Result<(), DbError> {
    ensure_store_exists(src)?;
    ensure_store_exists(dest)?;

    let dest_canonical = dest.canonicalize().map_err(|e| DbError::io(dest, e))?;
    let src_canonical = src.canonicalize().map_err(|e| DbError::io(src, e))?;
    if dest_canonical == src_canonical {
        return Err(DbError::SelfMerge(dest_canonical));
    }
    Ok(())
}

async fn attach_source(conn: &mut SqliteConnection, src: &Path) -> Result<(), DbError> {
    sqlx::query(&format!("ATTACH DATABASE ? AS {SRC_SCHEMA}"))
        .bind(src.to_string_lossy().into_owned())
        .execute(&mut *conn)
        .await?;
    verify_store_tables(conn, SRC_SCHEMA, src).await
}

async fn detach_source(conn: &mut SqliteConnection) -> Result<(), DbError> {
    sqlx::query(&format!("DETACH DATABASE {SRC_SCHEMA}"))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn plan_on(
    conn: &mut SqliteConnection,
    dest: &Path,
    src: &Path,
) -> Result<MergePlan, DbError> {
    verify_store_tables(conn, DEST_SCHEMA, dest).await?;
    attach_source(conn, src).await?;

    let dest_contents = load_contents(conn, DEST_SCHEMA).await?;
    let src_contents = load_contents(conn, SRC_SCHEMA).await?;

    detach_source(conn).await?;
    Ok(plan_merge(&dest_contents, &src_contents))
}

async fn merge_on(
    conn: &mut SqliteConnection,
    dest: &Path,
    src: &Path,
) -> Result<MergePlan, DbError> {
    verify_store_tables(conn, DEST_SCHEMA, dest).await?;
    run_migrations_on(conn).await?;
    attach_source(conn, src).await?;

    let mut tx = conn.begin().await?;
    let dest_contents = load_contents(&mut tx, DEST_SCHEMA).await?;
    let src_contents = load_contents(&mut tx, SRC_SCHEMA).await?;
    let plan = plan_merge(&dest_contents, &src_contents);
    apply_plan(&mut tx, &plan).await?;
    tx.commit().await?;

    detach_source(conn).await?;
    Ok(plan)
}

/// Compute what [`merge_stores`] would do without writing anything.
///
/// # Errors
///
/// Returns [`DbError::StoreNotFound`] or [`DbError::SelfMerge`] for a bad
/// pair of paths, [`DbError::IncompatibleStore`] if either file lacks a store
/// table, or [`DbError::Sqlx`] if a read fails.
pub async fn preview_merge(dest: &Path, src: &Path) -> Result<MergeReport, DbError> {
    check_pair(dest, src)?;

    let mut conn = SqliteConnection::connect_with(&connect_options(dest).read_only(true)).await?;
    let planned = plan_on(&mut conn, dest, src).await;
    let closed = conn.close().await;
    let report = planned?.report();
    closed?;

    tracing::info!(
        dest = %dest.display(),
        src = %src.display(),
        targets = report.targets_inserted,
        runs = report.runs_inserted,
        membership_inserted = report.membership_inserted,
        membership_updated = report.membership_updated,
        counts = report.counts_inserted,
        change_logs = report.change_log_inserted,
        "merge preview computed"
    );

    Ok(report)
}

/// Merge `src` into `dest` in one exclusive transaction.
///
/// When `backup` is set, `dest` is copied beside itself before anything is
/// written. `src` is only read. On any error the destination is left as it
/// was.
///
/// # Errors
///
/// Returns [`DbError::StoreNotFound`] or [`DbError::SelfMerge`] for a bad
/// pair of paths, [`DbError::IncompatibleStore`] if either file lacks a store
/// table, [`DbError::Io`] if the backup fails, or [`DbError::Sqlx`] /
/// [`DbError::Migration`] on storage failure.
pub async fn merge_stores(dest: &Path, src: &Path, backup: bool) -> Result<MergeReport, DbError> {
    check_pair(dest, src)?;

    let backup_path = if backup {
        Some(create_backup(dest)?)
    } else {
        None
    };

    let mut conn = SqliteConnection::connect_with(
        &connect_options(dest).locking_mode(SqliteLockingMode::Exclusive),
    )
    .await?;
    let merged = merge_on(&mut conn, dest, src).await;
    let closed = conn.close().await;
    let plan = merged?;
    closed?;

    let report = MergeReport {
        backup_path,
        ..plan.report()
    };

    tracing::info!(
        dest = %dest.display(),
        src = %src.display(),
        targets = report.targets_inserted,
        runs = report.runs_inserted,
        membership_inserted = report.membership_inserted,
        membership_updated = report.membership_updated,
        counts = report.counts_inserted,
        change_logs = report.change_log_inserted,
        "merge committed"
    );

    Ok(report)
}
