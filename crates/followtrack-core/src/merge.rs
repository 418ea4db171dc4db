//! Conflict resolution for one member's timeline when two stores disagree.
//!
//! Earliest sightings win for "first" fields, latest for "last" and "lost"
//! fields, and a member is lost only when every side says so. A merged
//! timeline that is not lost carries no lost fields.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipTimeline {
    pub added_at: DateTime<Utc>,
    pub is_lost: bool,
    pub lost_at: Option<DateTime<Utc>>,
    pub first_seen_run_at: Option<DateTime<Utc>>,
    pub last_seen_run_at: Option<DateTime<Utc>>,
    pub lost_at_run_at: Option<DateTime<Utc>>,
    pub estimated_added_at: Option<DateTime<Utc>>,
    pub estimated_removed_at: Option<DateTime<Utc>>,
}

impl MembershipTimeline {
    /// Merge two views of the same member and normalize the result.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            added_at: self.added_at.min(other.added_at),
            is_lost: self.is_lost && other.is_lost,
            lost_at: max_opt(self.lost_at, other.lost_at),
            first_seen_run_at: min_opt(self.first_seen_run_at, other.first_seen_run_at),
            last_seen_run_at: max_opt(self.last_seen_run_at, other.last_seen_run_at),
            lost_at_run_at: max_opt(self.lost_at_run_at, other.lost_at_run_at),
            estimated_added_at: min_opt(self.estimated_added_at, other.estimated_added_at),
            estimated_removed_at: max_opt(self.estimated_removed_at, other.estimated_removed_at),
        }
        .normalized()
    }

    /// Fold any number of rows for one member into a single timeline.
    ///
    /// Returns `None` for an empty input.
    pub fn aggregate<'a, I>(rows: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut rows = rows.into_iter();
        let first = rows.next()?.normalized();
        Some(rows.fold(first, |acc, row| acc.combine(row)))
    }

    /// Clear every lost-related field unless the member is lost.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if !self.is_lost {
            self.lost_at = None;
            self.lost_at_run_at = None;
            self.estimated_removed_at = None;
        }
        self
    }
}

fn min_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
