//! Turns one observed snapshot into the set of changes to apply to a
//! target's membership records for one member type.
//!
//! Planning is pure: the caller loads the existing records, asks for a plan,
//! and applies it inside a single transaction.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::coverage::CoveragePolicy;
use crate::time::{midpoint, midpoint_stored, StoredTimestamp};

/// The persisted state of one member that matters for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingMember {
    pub member: String,
    pub is_lost: bool,
    pub added_at: StoredTimestamp,
    pub first_seen_run_at: Option<StoredTimestamp>,
    pub last_seen_run_at: Option<StoredTimestamp>,
}

/// Timing of the run that produced the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotContext {
    pub run_started_at: DateTime<Utc>,
    /// Start of the last valid run before this one; `None` on a first run or
    /// after an interrupted one.
    pub prev_run_started_at: Option<DateTime<Utc>>,
    /// Set size claimed by the platform, when the collector could read it.
    pub expected_total: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub member: String,
    pub estimated_added_at: Option<DateTime<Utc>>,
}

/// A previously lost member seen again.
#[derive(Debug, Clone, PartialEq)]
pub struct RevivedMember {
    pub member: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LostMember {
    pub member: String,
    pub estimated_removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcilePlan {
    pub inserts: Vec<NewMember>,
    pub revivals: Vec<RevivedMember>,
    /// Active members seen again; only `last_seen_run_at` moves.
    pub refreshes: Vec<String>,
    pub losses: Vec<LostMember>,
    /// Active members absent from the snapshot, whether or not they were
    /// marked lost.
    pub lost_candidates: usize,
    pub active_existing_count: usize,
    pub lost_marking_applied: bool,
    /// Identifiers dropped from the snapshot because they were blank.
    pub skipped: Vec<String>,
    /// The identifiers actually accepted from the snapshot.
    pub observed: BTreeSet<String>,
}

impl ReconcilePlan {
    /// `true` when the guard held back one or more lost candidates.
    #[must_use]
    pub fn suppressed_losses(&self) -> bool {
        !self.lost_marking_applied && self.lost_candidates > 0
    }
}

/// Compute inserts, revivals, refreshes and losses for one snapshot.
#[must_use]
pub fn plan_reconciliation(
    existing: &[ExistingMember],
    observed: &BTreeSet<String>,
    context: &SnapshotContext,
    policy: &CoveragePolicy,
) -> ReconcilePlan {
    let mut by_member: HashMap<&str, &ExistingMember> = HashMap::with_capacity(existing.len());
    for record in existing {
        if by_member.insert(record.member.as_str(), record).is_some() {
            tracing::warn!(
                member = %record.member,
                "duplicate membership record; reconciling against the last one loaded"
            );
        }
    }

    let active_existing_count = by_member.values().filter(|r| !r.is_lost).count();
    let estimated_added_at = context
        .prev_run_started_at
        .map(|prev| midpoint(prev, context.run_started_at));

    let mut plan = ReconcilePlan {
        active_existing_count,
        ..ReconcilePlan::default()
    };

    for member in observed {
        if member.trim().is_empty() {
            tracing::warn!(member = ?member, "skipping blank member identifier");
            plan.skipped.push(member.clone());
            continue;
        }

        match by_member.get(member.as_str()) {
            None => plan.inserts.push(NewMember {
                member: member.clone(),
                estimated_added_at,
            }),
            Some(record) if record.is_lost => plan.revivals.push(RevivedMember {
                member: member.clone(),
            }),
            Some(_) => plan.refreshes.push(member.clone()),
        }
        plan.observed.insert(member.clone());
    }

    let mut candidates: Vec<&ExistingMember> = by_member
        .values()
        .filter(|r| !r.is_lost && !plan.observed.contains(&r.member))
        .copied()
        .collect();
    candidates.sort_by(|a, b| a.member.cmp(&b.member));
    plan.lost_candidates = candidates.len();

    plan.lost_marking_applied = policy.should_apply_lost_marking(
        plan.observed.len(),
        active_existing_count,
        context.expected_total,
    );

    if plan.lost_marking_applied {
        let run_started = StoredTimestamp::from(context.run_started_at);
        plan.losses = candidates
            .into_iter()
            .map(|record| {
                let last_confirmed = record
                    .last_seen_run_at
                    .or(record.first_seen_run_at)
                    .unwrap_or(record.added_at);
                LostMember {
                    member: record.member.clone(),
                    estimated_removed_at: midpoint_stored(&last_confirmed, &run_started),
                }
            })
            .collect();
    }

    plan
}
