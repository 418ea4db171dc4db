//! `poll`: take one snapshot per target and member type and reconcile it.
//!
//! Only one poll may run against a store at a time; the PID lock is taken
//! before any target is touched and released when the handler returns.

mod source;

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};
use followtrack_core::{
    AppConfig, CoveragePolicy, MemberType, PollLock, Snapshot, SnapshotContext, SnapshotSource,
};
use followtrack_db::{CollectedCounts, ReconcileOutcome};
use sqlx::SqlitePool;

pub(crate) use source::JsonDirSource;

/// What one target's run recorded.
#[derive(Debug, Clone)]
pub(crate) struct TargetPoll {
    pub username: String,
    pub run_id: i64,
    pub followers: ReconcileOutcome,
    pub followings: ReconcileOutcome,
}

/// Entry point for `followtrack poll`.
///
/// Targets come from `--target` when given, otherwise from the enabled
/// entries of the targets file.
///
/// # Errors
///
/// Returns an error if another poll holds the lock, no targets are
/// configured, or any target's run failed on storage.
pub(crate) async fn run_poll(
    pool: &SqlitePool,
    config: &AppConfig,
    targets: Vec<String>,
    snapshot_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let lock = PollLock::acquire(&config.lock_path, "poll")?;

    let targets = if targets.is_empty() {
        followtrack_core::load_targets(&config.targets_path)?.enabled_usernames()
    } else {
        targets
    };
    if targets.is_empty() {
        anyhow::bail!(
            "no targets to poll; pass --target or add entries to {}",
            config.targets_path.display()
        );
    }

    let source = JsonDirSource::new(snapshot_dir.unwrap_or_else(|| config.snapshot_dir.clone()));
    tracing::info!(
        targets = targets.len(),
        snapshot_dir = %source.root().display(),
        "poll starting"
    );

    let result = poll_targets(pool, &source, &targets, &config.coverage_policy()).await;
    lock.release()?;
    let (polls, failures) = result;

    for poll in &polls {
        println!(
            "{:<20} run {:<6} followers {:>6} (+{} -{}) followings {:>6} (+{} -{})",
            poll.username,
            poll.run_id,
            poll.followers.observed.len(),
            poll.followers.inserted + poll.followers.revived,
            poll.followers.marked_lost,
            poll.followings.observed.len(),
            poll.followings.inserted + poll.followings.revived,
            poll.followings.marked_lost,
        );
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} target(s) failed; see log", targets.len());
    }
    Ok(())
}

/// Poll each target in turn. A storage failure on one target is logged and
/// counted; the rest still run.
pub(crate) async fn poll_targets<S: SnapshotSource>(
    pool: &SqlitePool,
    source: &S,
    targets: &[String],
    policy: &CoveragePolicy,
) -> (Vec<TargetPoll>, usize) {
    let mut polls = Vec::with_capacity(targets.len());
    let mut failures = 0;

    for username in targets {
        match poll_target(pool, source, username, policy).await {
            Ok(poll) => polls.push(poll),
            Err(err) => {
                failures += 1;
                tracing::error!(username = %username, error = %format!("{err:#}"), "poll failed");
            }
        }
    }

    (polls, failures)
}

/// One run for one target: both member types reconciled, counts written,
/// the run closed as `success` or `failed`.
pub(crate) async fn poll_target<S: SnapshotSource>(
    pool: &SqlitePool,
    source: &S,
    username: &str,
    policy: &CoveragePolicy,
) -> anyhow::Result<TargetPoll> {
    let target = followtrack_db::get_or_create_target(pool, username).await?;
    let run_started_at = Utc::now().trunc_subsecs(6);
    let prev_run_started_at =
        followtrack_db::previous_run_started_at(pool, target.id, run_started_at).await?;
    let run = followtrack_db::start_run(pool, target.id, run_started_at).await?;

    let context = RunContext {
        target_id: target.id,
        run_id: run.id,
        run_started_at,
        prev_run_started_at,
    };
    let mut collected = CollectedCounts::default();

    let result = reconcile_both(pool, source, username, &context, policy, &mut collected).await;
    match result {
        Ok((followers, followings)) => {
            followtrack_db::complete_run(pool, run.id, collected, Utc::now()).await?;
            tracing::info!(
                username,
                run_id = run.id,
                followers = collected.followers,
                followings = collected.followings,
                "run complete"
            );
            Ok(TargetPoll {
                username: username.to_string(),
                run_id: run.id,
                followers,
                followings,
            })
        }
        Err(err) => {
            fail_run_best_effort(pool, run.id, collected).await;
            Err(err)
        }
    }
}

struct RunContext {
    target_id: i64,
    run_id: i64,
    run_started_at: DateTime<Utc>,
    prev_run_started_at: Option<DateTime<Utc>>,
}

async fn reconcile_both<S: SnapshotSource>(
    pool: &SqlitePool,
    source: &S,
    username: &str,
    run: &RunContext,
    policy: &CoveragePolicy,
    collected: &mut CollectedCounts,
) -> anyhow::Result<(ReconcileOutcome, ReconcileOutcome)> {
    let followers = reconcile_type(pool, source, username, MemberType::Follower, run, policy).await?;
    collected.followers = observed_len(&followers);

    let followings =
        reconcile_type(pool, source, username, MemberType::Following, run, policy).await?;
    collected.followings = observed_len(&followings);

    Ok((followers, followings))
}

async fn reconcile_type<S: SnapshotSource>(
    pool: &SqlitePool,
    source: &S,
    username: &str,
    member_type: MemberType,
    run: &RunContext,
    policy: &CoveragePolicy,
) -> anyhow::Result<ReconcileOutcome> {
    let snapshot = match source.fetch_members(username, member_type).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(
                username,
                member_type = %member_type,
                error = %err,
                "snapshot collection failed; reconciling an empty set"
            );
            Snapshot::default()
        }
    };

    let context = SnapshotContext {
        run_started_at: run.run_started_at,
        prev_run_started_at: run.prev_run_started_at,
        expected_total: snapshot.claimed_total,
    };
    let outcome = followtrack_db::reconcile_snapshot(
        pool,
        run.target_id,
        member_type,
        &snapshot.members,
        &context,
        policy,
    )
    .await?;

    followtrack_db::insert_count(
        pool,
        run.target_id,
        member_type.count_type(),
        observed_len(&outcome),
        run.run_started_at,
        Some(run.run_id),
    )
    .await?;

    Ok(outcome)
}

fn observed_len(outcome: &ReconcileOutcome) -> i64 {
    i64::try_from(outcome.observed.len()).unwrap_or(i64::MAX)
}

async fn fail_run_best_effort(pool: &SqlitePool, run_id: i64, collected: CollectedCounts) {
    if let Err(mark_err) = followtrack_db::fail_run(pool, run_id, collected, Utc::now()).await {
        tracing::error!(run_id, error = %mark_err, "failed to mark poll run as failed");
    }
}
