//! Boundary with the collector that scrapes a target's member lists.
//!
//! The collector itself lives outside this workspace. All the tracker needs
//! from it is the current set of identifiers for one target and member type,
//! plus the total the platform claims when it is visible.

use std::collections::BTreeSet;
use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use crate::members::MemberType;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub members: BTreeSet<String>,
    pub claimed_total: Option<i64>,
}

impl Snapshot {
    /// Build a snapshot from raw identifiers, dropping duplicates.
    pub fn from_members<I, S>(members: I, claimed_total: Option<i64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            claimed_total,
        }
    }

    /// Parse the JSON document a collector writes: either a bare array of
    /// identifiers or `{"members": [...], "claimed_total": n}`.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the document has neither shape.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: SnapshotDocument = serde_json::from_str(raw)?;
        Ok(match parsed {
            SnapshotDocument::Bare(members) => Self::from_members(members, None),
            SnapshotDocument::Full {
                members,
                claimed_total,
            } => Self::from_members(members, claimed_total),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Bare(Vec<String>),
    Full {
        members: Vec<String>,
        #[serde(default)]
        claimed_total: Option<i64>,
    },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no snapshot available for {target} ({member_type})")]
    Missing {
        target: String,
        member_type: MemberType,
    },

    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Supplies the current member set of a target.
///
/// Called once per member type per run. An error is a transient collection
/// failure: the caller reconciles an empty snapshot and lets the coverage
/// guard decide what that means.
pub trait SnapshotSource {
    fn fetch_members(
        &self,
        target: &str,
        member_type: MemberType,
    ) -> impl Future<Output = Result<Snapshot, SnapshotError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_array_has_no_claimed_total() {
        let snapshot = Snapshot::from_json(r#"["b", "a", "b"]"#).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.claimed_total.is_none());
    }

    #[test]
    fn object_form_carries_claimed_total() {
        let snapshot =
            Snapshot::from_json(r#"{"members": ["alice"], "claimed_total": 1200}"#).unwrap();
        assert!(snapshot.members.contains("alice"));
        assert_eq!(snapshot.claimed_total, Some(1200));
    }

    #[test]
    fn object_form_without_total_defaults_to_none() {
        let snapshot = Snapshot::from_json(r#"{"members": []}"#).unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.claimed_total.is_none());
    }

    #[test]
    fn other_shapes_are_rejected() {
        assert!(Snapshot::from_json(r#"{"users": ["alice"]}"#).is_err());
    }
}
