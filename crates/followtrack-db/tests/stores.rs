//! Whole-store tests: merge, preview, export, integrity, vacuum and purge.
//!
//! These operate on real store files, so each test works inside its own
//! `tempfile` directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use followtrack_core::{CountType, CoveragePolicy, MemberType, SnapshotContext};
use followtrack_db::{
    complete_run, connect_options, export_store, get_membership, get_or_create_target, get_run,
    integrity_check, list_counts, merge_stores, open_store, preview_merge,
    previous_run_started_at, purge_targets, reconcile_snapshot, start_run, vacuum_store,
    CollectedCounts, DbError, PoolConfig, STORE_TABLES,
};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn utc(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap_or_else(|e| panic!("bad test timestamp '{raw}': {e}"))
        .with_timezone(&Utc)
}

fn members(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

async fn open(path: &Path) -> SqlitePool {
    open_store(path, PoolConfig::default())
        .await
        .unwrap_or_else(|e| panic!("open_store failed for {}: {e}", path.display()))
}

/// One complete follower poll: run, reconcile, count, finish.
async fn poll(pool: &SqlitePool, target: &str, observed: &[&str], at: &str) {
    let at = utc(at);
    let target_id = get_or_create_target(pool, target)
        .await
        .expect("get_or_create_target failed")
        .id;
    let prev = previous_run_started_at(pool, target_id, at)
        .await
        .expect("previous_run_started_at failed");
    let run = start_run(pool, target_id, at).await.expect("start_run failed");

    let context = SnapshotContext {
        run_started_at: at,
        prev_run_started_at: prev,
        expected_total: None,
    };
    let outcome = reconcile_snapshot(
        pool,
        target_id,
        MemberType::Follower,
        &members(observed),
        &context,
        &CoveragePolicy::default(),
    )
    .await
    .expect("reconcile_snapshot failed");

    let accepted = i64::try_from(outcome.observed.len()).expect("count overflow");
    followtrack_db::insert_count(pool, target_id, CountType::Followers, accepted, at, Some(run.id))
        .await
        .expect("insert_count failed");
    let collected = CollectedCounts {
        followers: accepted,
        followings: 0,
    };
    complete_run(pool, run.id, collected, at).await.expect("complete_run failed");
}

/// Build a store at `dir/name` from a list of polls and close it.
async fn build_store(dir: &TempDir, name: &str, polls: &[(&str, &[&str], &str)]) -> PathBuf {
    let path = dir.path().join(name);
    let pool = open(&path).await;
    for (target, observed, at) in polls {
        poll(&pool, target, observed, at).await;
    }
    pool.close().await;
    path
}

async fn row_counts(path: &Path) -> Vec<i64> {
    let pool = open(path).await;
    let mut counts = Vec::new();
    for table in STORE_TABLES {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("count {table} failed: {e}"));
        counts.push(n);
    }
    pool.close().await;
    counts
}

fn tempdir() -> TempDir {
    tempfile::tempdir().expect("tempdir failed")
}

// ---------------------------------------------------------------------------
// Section 1: Merge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn merge_into_empty_store_copies_everything() {
    let dir = tempdir();
    let src = build_store(
        &dir,
        "src.db",
        &[
            ("acme", &["a", "b", "c"], "2024-01-01T00:00:00Z"),
            ("acme", &["a", "b"], "2024-01-01T12:00:00Z"),
        ],
    )
    .await;
    let dest = build_store(&dir, "dest.db", &[]).await;

    let report = merge_stores(&dest, &src, false).await.expect("merge failed");

    assert_eq!(report.targets_inserted, 1);
    assert_eq!(report.runs_inserted, 2);
    assert_eq!(report.membership_inserted, 3);
    assert_eq!(report.membership_updated, 0);
    assert_eq!(report.counts_inserted, 2);
    // a, b, c gained at the first run; c lost at the second.
    assert_eq!(report.change_log_inserted, 4);
    assert!(report.backup_path.is_none());
    assert_eq!(row_counts(&dest).await, row_counts(&src).await);
}

#[tokio::test]
async fn second_merge_is_a_noop() {
    let dir = tempdir();
    let src = build_store(
        &dir,
        "src.db",
        &[
            ("acme", &["a", "b", "c"], "2024-01-01T00:00:00Z"),
            ("acme", &["a", "b"], "2024-01-01T12:00:00Z"),
            ("globex", &["x"], "2024-01-01T06:00:00Z"),
        ],
    )
    .await;
    let dest = build_store(
        &dir,
        "dest.db",
        &[
            ("acme", &["a", "d"], "2024-01-01T03:00:00Z"),
            ("acme", &["d"], "2024-01-02T00:00:00Z"),
        ],
    )
    .await;

    let first = merge_stores(&dest, &src, false).await.expect("first merge failed");
    assert!(!first.is_noop());
    let after_first = row_counts(&dest).await;

    let second = merge_stores(&dest, &src, false).await.expect("second merge failed");
    assert!(second.is_noop(), "second merge changed rows: {second:?}");
    assert_eq!(row_counts(&dest).await, after_first);
}

#[tokio::test]
async fn preview_reports_exactly_what_merge_does() {
    let dir = tempdir();
    let src = build_store(
        &dir,
        "src.db",
        &[
            ("acme", &["alice", "bob"], "2024-01-01T00:00:00Z"),
            ("acme", &["alice", "bob"], "2024-01-03T00:00:00Z"),
            ("globex", &["x", "y"], "2024-01-02T00:00:00Z"),
        ],
    )
    .await;
    let dest = build_store(
        &dir,
        "dest.db",
        &[
            ("acme", &["alice", "bob"], "2024-01-01T00:00:00Z"),
            ("acme", &["bob"], "2024-01-02T00:00:00Z"),
        ],
    )
    .await;
    let before = row_counts(&dest).await;

    let preview = preview_merge(&dest, &src).await.expect("preview failed");
    assert_eq!(row_counts(&dest).await, before, "preview must not write");

    let merged = merge_stores(&dest, &src, false).await.expect("merge failed");
    assert_eq!(preview, merged);
    assert_eq!(merged.targets_inserted, 1);
    assert_eq!(merged.runs_inserted, 2);
    assert_eq!(merged.membership_inserted, 2);
    // alice revived by newer presence evidence; bob's last_seen moves forward.
    assert_eq!(merged.membership_updated, 2);

    let again = preview_merge(&dest, &src).await.expect("preview failed");
    assert!(again.is_noop(), "preview after merge: {again:?}");
}

#[tokio::test]
async fn presence_evidence_overrides_loss_on_merge() {
    let dir = tempdir();
    // Destination lost alice after D1; the source saw her at D2 > D1.
    let dest = build_store(
        &dir,
        "dest.db",
        &[
            ("acme", &["alice", "x"], "2024-01-01T00:00:00Z"),
            ("acme", &["x"], "2024-01-02T00:00:00Z"),
        ],
    )
    .await;
    let src = build_store(
        &dir,
        "src.db",
        &[
            ("acme", &["alice", "x"], "2024-01-01T00:00:00Z"),
            ("acme", &["alice", "x"], "2024-01-03T00:00:00Z"),
        ],
    )
    .await;

    merge_stores(&dest, &src, false).await.expect("merge failed");

    let pool = open(&dest).await;
    let target = get_or_create_target(&pool, "acme").await.expect("target failed");
    let alice = get_membership(&pool, target.id, "alice", MemberType::Follower)
        .await
        .expect("get_membership failed");
    pool.close().await;

    assert!(!alice.is_lost);
    assert_eq!(alice.lost_at, None);
    assert_eq!(alice.lost_at_run_at, None);
    assert_eq!(alice.estimated_removed_at, None);
    assert_eq!(alice.last_seen_run_at, Some(utc("2024-01-03T00:00:00Z")));
    assert_eq!(alice.first_seen_run_at, Some(utc("2024-01-01T00:00:00Z")));
}

#[tokio::test]
async fn merged_counts_link_to_destination_runs() {
    let dir = tempdir();
    // Extra destination runs shift ids so source ids would point elsewhere.
    let dest = build_store(
        &dir,
        "dest.db",
        &[
            ("other", &["q"], "2023-06-01T00:00:00Z"),
            ("other", &["q"], "2023-06-02T00:00:00Z"),
            ("other", &["q"], "2023-06-03T00:00:00Z"),
        ],
    )
    .await;
    let src = build_store(
        &dir,
        "src.db",
        &[
            ("acme", &["a"], "2024-01-01T00:00:00Z"),
            ("acme", &["a"], "2024-01-02T00:00:00Z"),
        ],
    )
    .await;

    merge_stores(&dest, &src, false).await.expect("merge failed");

    let pool = open(&dest).await;
    let target = get_or_create_target(&pool, "acme").await.expect("target failed");
    let counts = list_counts(&pool, target.id, Some(CountType::Followers))
        .await
        .expect("list_counts failed");
    assert_eq!(counts.len(), 2);
    for count in counts {
        let run_id = count.run_id.expect("count should be linked to a run");
        let run = get_run(&pool, run_id).await.expect("get_run failed");
        assert_eq!(run.target_id, target.id);
        assert_eq!(run.run_started_at, count.timestamp);
    }
    pool.close().await;
}

#[tokio::test]
async fn merge_with_backup_copies_destination_first() {
    let dir = tempdir();
    let src = build_store(&dir, "src.db", &[("acme", &["a"], "2024-01-01T00:00:00Z")]).await;
    let dest = build_store(&dir, "dest.db", &[]).await;
    let original = std::fs::read(&dest).expect("read dest failed");

    let report = merge_stores(&dest, &src, true).await.expect("merge failed");

    let backup = report.backup_path.expect("backup path missing");
    assert!(backup.exists());
    assert_eq!(std::fs::read(&backup).expect("read backup failed"), original);
}

#[tokio::test]
async fn merge_into_itself_is_rejected() {
    let dir = tempdir();
    let store = build_store(&dir, "store.db", &[("acme", &["a"], "2024-01-01T00:00:00Z")]).await;
    let same_file = dir.path().join(".").join("store.db");

    let err = merge_stores(&store, &same_file, false).await.unwrap_err();
    assert!(matches!(err, DbError::SelfMerge(_)));

    let err = preview_merge(&store, &store).await.unwrap_err();
    assert!(matches!(err, DbError::SelfMerge(_)));
}

#[tokio::test]
async fn merge_from_missing_source_is_rejected() {
    let dir = tempdir();
    let dest = build_store(&dir, "dest.db", &[]).await;

    let err = merge_stores(&dest, &dir.path().join("absent.db"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::StoreNotFound(_)));
}

#[tokio::test]
async fn merge_from_foreign_database_is_rejected() {
    let dir = tempdir();
    let dest = build_store(&dir, "dest.db", &[("acme", &["a"], "2024-01-01T00:00:00Z")]).await;
    let before = row_counts(&dest).await;

    let foreign = dir.path().join("foreign.db");
    let mut conn =
        SqliteConnection::connect_with(&connect_options(&foreign).create_if_missing(true))
            .await
            .expect("create foreign db failed");
    sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
        .execute(&mut conn)
        .await
        .expect("create table failed");
    conn.close().await.expect("close failed");

    let err = merge_stores(&dest, &foreign, false).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::IncompatibleStore {
            table: "targets",
            ..
        }
    ));
    assert_eq!(row_counts(&dest).await, before);
}

#[tokio::test]
async fn merge_into_foreign_database_is_rejected_like_preview() {
    let dir = tempdir();
    let src = build_store(&dir, "src.db", &[("acme", &["a"], "2024-01-01T00:00:00Z")]).await;

    let foreign = dir.path().join("foreign.db");
    let mut conn =
        SqliteConnection::connect_with(&connect_options(&foreign).create_if_missing(true))
            .await
            .expect("create foreign db failed");
    sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
        .execute(&mut conn)
        .await
        .expect("create table failed");
    conn.close().await.expect("close failed");

    let preview = preview_merge(&foreign, &src).await.unwrap_err();
    let merge = merge_stores(&foreign, &src, false).await.unwrap_err();
    for err in [preview, merge] {
        assert!(
            matches!(err, DbError::IncompatibleStore { table: "targets", .. }),
            "unexpected error: {err}"
        );
    }

    let mut conn = SqliteConnection::connect_with(&connect_options(&foreign))
        .await
        .expect("reopen foreign db failed");
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&mut conn)
            .await
            .expect("list tables failed");
    conn.close().await.expect("close failed");
    assert_eq!(tables, vec!["notes".to_string()]);
}

/// A store as the earlier release left it: same tables, no migration history
/// and no unique member index.
async fn build_legacy_store(path: &Path, statements: &[&str]) {
    let mut conn = SqliteConnection::connect_with(&connect_options(path).create_if_missing(true))
        .await
        .expect("create legacy store failed");
    let schema = [
        "CREATE TABLE targets (id INTEGER PRIMARY KEY, username VARCHAR NOT NULL UNIQUE)",
        "CREATE TABLE run_history (id INTEGER PRIMARY KEY, target_id INTEGER NOT NULL, \
         run_started_at DATETIME NOT NULL, run_finished_at DATETIME, status VARCHAR NOT NULL, \
         followers_collected INTEGER, followings_collected INTEGER)",
        "CREATE TABLE followers_followings (id INTEGER PRIMARY KEY, target_id INTEGER NOT NULL, \
         follower_following_username VARCHAR NOT NULL, is_follower BOOLEAN NOT NULL, \
         added_at DATETIME NOT NULL, lost_at DATETIME, is_lost BOOLEAN NOT NULL, \
         first_seen_run_at DATETIME, last_seen_run_at DATETIME, lost_at_run_at DATETIME, \
         estimated_added_at DATETIME, estimated_removed_at DATETIME)",
        "CREATE TABLE change_logs (id INTEGER PRIMARY KEY, timestamp DATETIME NOT NULL, \
         change_type VARCHAR NOT NULL, username VARCHAR NOT NULL)",
        "CREATE TABLE counts (id INTEGER PRIMARY KEY, target_id INTEGER NOT NULL, \
         count_type VARCHAR NOT NULL, count INTEGER NOT NULL, timestamp DATETIME NOT NULL, \
         run_id INTEGER)",
    ];
    for sql in schema.iter().chain(statements) {
        sqlx::query(sql)
            .execute(&mut conn)
            .await
            .unwrap_or_else(|e| panic!("legacy statement failed: {e}\n{sql}"));
    }
    conn.close().await.expect("close failed");
}

#[tokio::test]
async fn legacy_store_with_duplicate_members_is_folded_and_merged() {
    let dir = tempdir();
    let dest = dir.path().join("legacy.db");
    build_legacy_store(
        &dest,
        &[
            "INSERT INTO targets (id, username) VALUES (1, 'acme')",
            // A lost row seen later, then an active row seen first.
            "INSERT INTO followers_followings (id, target_id, follower_following_username, \
             is_follower, added_at, lost_at, is_lost, first_seen_run_at, last_seen_run_at, \
             lost_at_run_at, estimated_removed_at) VALUES (1, 1, 'alice', 1, \
             '2024-01-02 00:00:00.000000', '2024-01-03 00:00:00.000000', 1, \
             '2024-01-02 00:00:00.000000', '2024-01-02 00:00:00.000000', \
             '2024-01-03 00:00:00.000000', '2024-01-02 12:00:00.000000')",
            "INSERT INTO followers_followings (id, target_id, follower_following_username, \
             is_follower, added_at, is_lost, first_seen_run_at, last_seen_run_at) \
             VALUES (2, 1, 'alice', 1, '2024-01-01 00:00:00.000000', 0, \
             '2024-01-01 00:00:00.000000', '2024-01-01 00:00:00.000000')",
        ],
    )
    .await;
    let src = build_store(&dir, "src.db", &[("acme", &["alice"], "2024-01-05T00:00:00Z")]).await;

    let preview = preview_merge(&dest, &src).await.expect("preview failed");
    let merged = merge_stores(&dest, &src, false).await.expect("merge failed");

    assert_eq!(preview, merged);
    assert_eq!(merged.targets_inserted, 0);
    assert_eq!(merged.runs_inserted, 1);
    assert_eq!(merged.membership_inserted, 0);
    assert_eq!(merged.membership_updated, 1);

    let pool = open(&dest).await;
    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM followers_followings WHERE follower_following_username = 'alice'",
    )
    .fetch_one(&pool)
    .await
    .expect("count failed");
    assert_eq!(rows, 1);

    let alice = get_membership(&pool, 1, "alice", MemberType::Follower)
        .await
        .expect("get_membership failed");
    pool.close().await;

    assert_eq!(alice.id, 2);
    assert!(!alice.is_lost);
    assert_eq!(alice.lost_at, None);
    assert_eq!(alice.lost_at_run_at, None);
    assert_eq!(alice.estimated_removed_at, None);
    assert_eq!(alice.added_at, utc("2024-01-01T00:00:00Z"));
    assert_eq!(alice.first_seen_run_at, Some(utc("2024-01-01T00:00:00Z")));
    assert_eq!(alice.last_seen_run_at, Some(utc("2024-01-05T00:00:00Z")));
}

#[tokio::test]
async fn legacy_store_with_all_duplicates_lost_keeps_latest_loss() {
    let dir = tempdir();
    let path = dir.path().join("legacy.db");
    build_legacy_store(
        &path,
        &[
            "INSERT INTO targets (id, username) VALUES (1, 'acme')",
            "INSERT INTO followers_followings (id, target_id, follower_following_username, \
             is_follower, added_at, lost_at, is_lost, first_seen_run_at, last_seen_run_at, \
             lost_at_run_at) VALUES (1, 1, 'bob', 0, '2024-01-01 00:00:00', \
             '2024-01-02 00:00:00', 1, '2024-01-01 00:00:00', '2024-01-01 00:00:00', \
             '2024-01-02 00:00:00')",
            "INSERT INTO followers_followings (id, target_id, follower_following_username, \
             is_follower, added_at, lost_at, is_lost, first_seen_run_at, last_seen_run_at, \
             lost_at_run_at) VALUES (2, 1, 'bob', 0, '2024-01-03 00:00:00', \
             '2024-01-05 00:00:00', 1, '2024-01-03 00:00:00', '2024-01-04 00:00:00', \
             '2024-01-05 00:00:00')",
        ],
    )
    .await;

    let pool = open(&path).await;
    let bob = get_membership(&pool, 1, "bob", MemberType::Following)
        .await
        .expect("get_membership failed");
    pool.close().await;

    assert_eq!(bob.id, 1);
    assert!(bob.is_lost);
    assert_eq!(bob.first_seen_run_at, Some(utc("2024-01-01T00:00:00Z")));
    assert_eq!(bob.last_seen_run_at, Some(utc("2024-01-04T00:00:00Z")));
    assert_eq!(bob.lost_at_run_at, Some(utc("2024-01-05T00:00:00Z")));
}

// ---------------------------------------------------------------------------
// Section 2: Export, integrity, vacuum
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_is_a_byte_copy_that_respects_overwrite() {
    let dir = tempdir();
    let src = build_store(&dir, "src.db", &[("acme", &["a"], "2024-01-01T00:00:00Z")]).await;
    let out = dir.path().join("nested").join("copy.db");

    let written = export_store(&src, Some(&out), false).expect("export failed");
    assert_eq!(written, out);
    assert_eq!(
        std::fs::read(&out).expect("read copy failed"),
        std::fs::read(&src).expect("read src failed")
    );

    let err = export_store(&src, Some(&out), false).unwrap_err();
    assert!(matches!(err, DbError::DestinationExists(_)));

    export_store(&src, Some(&out), true).expect("overwrite export failed");
}

#[tokio::test]
async fn export_of_missing_store_fails() {
    let dir = tempdir();
    let err = export_store(&dir.path().join("absent.db"), None, false).unwrap_err();
    assert!(matches!(err, DbError::StoreNotFound(_)));
}

#[tokio::test]
async fn healthy_store_passes_integrity_check() {
    let dir = tempdir();
    let store = build_store(&dir, "store.db", &[("acme", &["a"], "2024-01-01T00:00:00Z")]).await;

    let report = integrity_check(&store).await.expect("integrity_check failed");
    assert!(report.is_ok(), "unexpected report: {report:?}");
}

#[tokio::test]
async fn vacuum_reclaims_space_after_purge() {
    let dir = tempdir();
    let names: Vec<String> = (0..2000).map(|i| format!("member_{i:05}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let store = build_store(&dir, "store.db", &[("acme", &refs, "2024-01-01T00:00:00Z")]).await;

    purge_targets(&store, &["acme".to_string()], true, false)
        .await
        .expect("purge failed");
    let report = vacuum_store(&store).await.expect("vacuum failed");

    assert!(report.after_bytes < report.before_bytes, "{report:?}");
    assert!(report.saved_bytes() > 0);
    assert!(integrity_check(&store).await.expect("integrity failed").is_ok());
}

// ---------------------------------------------------------------------------
// Section 3: Target purge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn purge_preview_counts_rows_without_deleting() {
    let dir = tempdir();
    let store = build_store(
        &dir,
        "store.db",
        &[
            ("acme", &["a", "b"], "2024-01-01T00:00:00Z"),
            ("acme", &["a"], "2024-01-02T00:00:00Z"),
            ("globex", &["x"], "2024-01-01T00:00:00Z"),
        ],
    )
    .await;
    let before = row_counts(&store).await;

    let report = purge_targets(&store, &["acme".to_string(), "ghost".to_string()], false, true)
        .await
        .expect("purge preview failed");

    assert!(!report.applied);
    assert_eq!(report.matched_targets, vec!["acme".to_string()]);
    assert_eq!(report.missing_targets, vec!["ghost".to_string()]);
    assert_eq!(report.targets, 1);
    assert_eq!(report.runs, 2);
    assert_eq!(report.memberships, 2);
    assert_eq!(report.counts, 2);
    assert!(report.backup_path.is_none());
    assert_eq!(row_counts(&store).await, before);
}

#[tokio::test]
async fn purge_apply_deletes_only_named_targets() {
    let dir = tempdir();
    let store = build_store(
        &dir,
        "store.db",
        &[
            ("acme", &["a", "b"], "2024-01-01T00:00:00Z"),
            ("globex", &["x"], "2024-01-01T00:00:00Z"),
        ],
    )
    .await;

    let report = purge_targets(&store, &["acme".to_string()], true, true)
        .await
        .expect("purge failed");
    assert!(report.applied);
    assert!(report.backup_path.as_ref().is_some_and(|p| p.exists()));

    let pool = open(&store).await;
    let remaining: Vec<String> = sqlx::query_scalar("SELECT username FROM targets")
        .fetch_all(&pool)
        .await
        .expect("select targets failed");
    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM followers_followings WHERE target_id NOT IN (SELECT id FROM targets)",
    )
    .fetch_one(&pool)
    .await
    .expect("orphan check failed");
    pool.close().await;

    assert_eq!(remaining, vec!["globex".to_string()]);
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn purge_requires_matching_targets() {
    let dir = tempdir();
    let store = build_store(&dir, "store.db", &[("acme", &["a"], "2024-01-01T00:00:00Z")]).await;

    let err = purge_targets(&store, &["  ".to_string()], false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NoTargetsGiven));

    let err = purge_targets(&store, &["ghost".to_string()], true, false)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NoMatchingTargets(ref names) if names == &["ghost".to_string()]));
}
