//! Applies one observed snapshot for a (target, type) pair.
//!
//! The plan is computed by [`followtrack_core::plan_reconciliation`] against
//! rows loaded inside the same transaction, so the whole pass commits or
//! rolls back as one unit.

use std::borrow::Cow;
use std::collections::BTreeSet;

use followtrack_core::{
    format_stored, plan_reconciliation, CoveragePolicy, MemberType, ReconcilePlan,
    SnapshotContext,
};
use sqlx::{SqliteConnection, SqlitePool};

use crate::change_logs::insert_change_log_if_absent;
use crate::memberships::load_existing_members;
use crate::DbError;

/// Per-pass statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub inserted: usize,
    pub revived: usize,
    pub refreshed: usize,
    pub marked_lost: usize,
    /// Active members absent from the snapshot, marked lost or not.
    pub lost_candidates: usize,
    pub lost_marking_applied: bool,
    /// Blank identifiers plus members whose stored row could not be read.
    pub skipped: usize,
    pub change_log_inserted: usize,
    /// The accepted snapshot; its size is what the poll records as a count.
    pub observed: BTreeSet<String>,
}

/// Reconcile `observed` against the stored timelines of one target and type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any storage failure (nothing is committed).
/// A stored row with an unreadable timestamp is skipped, not an error: that
/// member's row is left untouched and is not counted as active.
pub async fn reconcile_snapshot(
    pool: &SqlitePool,
    target_id: i64,
    member_type: MemberType,
    observed: &BTreeSet<String>,
    context: &SnapshotContext,
    policy: &CoveragePolicy,
) -> Result<ReconcileOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let existing = load_existing_members(&mut tx, target_id, member_type).await?;
    let accepted = if existing.unreadable.is_empty() {
        Cow::Borrowed(observed)
    } else {
        Cow::Owned(
            observed
                .iter()
                .filter(|member| !existing.unreadable.contains(member))
                .cloned()
                .collect::<BTreeSet<String>>(),
        )
    };
    let plan = plan_reconciliation(&existing.readable, &accepted, context, policy);

    if plan.suppressed_losses() {
        tracing::warn!(
            target_id,
            member_type = %member_type,
            observed = plan.observed.len(),
            active_existing = plan.active_existing_count,
            expected_total = ?context.expected_total,
            lost_candidates = plan.lost_candidates,
            "snapshot looks incomplete; skipping lost marking for this run"
        );
    }

    let change_log_inserted = apply_plan(&mut tx, target_id, member_type, context, &plan).await?;

    tx.commit().await?;

    let outcome = ReconcileOutcome {
        inserted: plan.inserts.len(),
        revived: plan.revivals.len(),
        refreshed: plan.refreshes.len(),
        marked_lost: plan.losses.len(),
        lost_candidates: plan.lost_candidates,
        lost_marking_applied: plan.lost_marking_applied,
        skipped: plan.skipped.len() + existing.unreadable.len(),
        change_log_inserted,
        observed: plan.observed,
    };

    tracing::info!(
        target_id,
        member_type = %member_type,
        inserted = outcome.inserted,
        revived = outcome.revived,
        refreshed = outcome.refreshed,
        marked_lost = outcome.marked_lost,
        skipped = outcome.skipped,
        "reconciled snapshot"
    );

    Ok(outcome)
}

async fn apply_plan(
    conn: &mut SqliteConnection,
    target_id: i64,
    member_type: MemberType,
    context: &SnapshotContext,
    plan: &ReconcilePlan,
) -> Result<usize, DbError> {
    let run_at = format_stored(context.run_started_at);
    let is_follower = member_type.is_follower();
    let mut change_log_inserted = 0;

    for new_member in &plan.inserts {
        sqlx::query(
            "INSERT INTO followers_followings \
             (target_id, follower_following_username, is_follower, added_at, is_lost, \
              first_seen_run_at, last_seen_run_at, estimated_added_at) \
             VALUES (?1, ?2, ?3, ?4, 0, ?4, ?4, ?5)",
        )
        .bind(target_id)
        .bind(&new_member.member)
        .bind(is_follower)
        .bind(&run_at)
        .bind(new_member.estimated_added_at.map(format_stored))
        .execute(&mut *conn)
        .await?;

        if insert_change_log_if_absent(
            conn,
            context.run_started_at,
            member_type.gained_change(),
            &new_member.member,
        )
        .await?
        {
            change_log_inserted += 1;
        }
    }

    for revived in &plan.revivals {
        sqlx::query(
            "UPDATE followers_followings \
             SET is_lost = 0, lost_at = NULL, lost_at_run_at = NULL, estimated_removed_at = NULL, \
                 last_seen_run_at = ?1, first_seen_run_at = COALESCE(first_seen_run_at, added_at) \
             WHERE target_id = ?2 AND follower_following_username = ?3 AND is_follower = ?4",
        )
        .bind(&run_at)
        .bind(target_id)
        .bind(&revived.member)
        .bind(is_follower)
        .execute(&mut *conn)
        .await?;

        if insert_change_log_if_absent(
            conn,
            context.run_started_at,
            member_type.gained_change(),
            &revived.member,
        )
        .await?
        {
            change_log_inserted += 1;
        }
    }

    for member in &plan.refreshes {
        sqlx::query(
            "UPDATE followers_followings SET last_seen_run_at = ?1 \
             WHERE target_id = ?2 AND follower_following_username = ?3 AND is_follower = ?4",
        )
        .bind(&run_at)
        .bind(target_id)
        .bind(member)
        .bind(is_follower)
        .execute(&mut *conn)
        .await?;
    }

    for lost in &plan.losses {
        sqlx::query(
            "UPDATE followers_followings \
             SET is_lost = 1, lost_at = ?1, lost_at_run_at = ?1, estimated_removed_at = ?2 \
             WHERE target_id = ?3 AND follower_following_username = ?4 AND is_follower = ?5",
        )
        .bind(&run_at)
        .bind(format_stored(lost.estimated_removed_at))
        .bind(target_id)
        .bind(&lost.member)
        .bind(is_follower)
        .execute(&mut *conn)
        .await?;

        if insert_change_log_if_absent(
            conn,
            context.run_started_at,
            member_type.lost_change(),
            &lost.member,
        )
        .await?
        {
            change_log_inserted += 1;
        }
    }

    Ok(change_log_inserted)
}
