//! Vocabulary shared by the store, the reconciler, and the reporting layer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Which of a target's two sets a membership record belongs to.
///
/// Persisted as the `is_follower` boolean column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Follower,
    Following,
}

impl MemberType {
    pub const ALL: [MemberType; 2] = [MemberType::Follower, MemberType::Following];

    #[must_use]
    pub fn is_follower(self) -> bool {
        matches!(self, MemberType::Follower)
    }

    #[must_use]
    pub fn from_is_follower(is_follower: bool) -> Self {
        if is_follower {
            MemberType::Follower
        } else {
            MemberType::Following
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MemberType::Follower => "follower",
            MemberType::Following => "following",
        }
    }

    /// The `counts.count_type` value for samples of this set.
    #[must_use]
    pub fn count_type(self) -> CountType {
        match self {
            MemberType::Follower => CountType::Followers,
            MemberType::Following => CountType::Followings,
        }
    }

    #[must_use]
    pub fn gained_change(self) -> ChangeType {
        match self {
            MemberType::Follower => ChangeType::FollowerGained,
            MemberType::Following => ChangeType::FollowingAdded,
        }
    }

    #[must_use]
    pub fn lost_change(self) -> ChangeType {
        match self {
            MemberType::Follower => ChangeType::FollowerLost,
            MemberType::Following => ChangeType::FollowingRemoved,
        }
    }
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follower" | "followers" => Ok(MemberType::Follower),
            "following" | "followings" => Ok(MemberType::Following),
            other => Err(CoreError::InvalidMemberType(other.to_string())),
        }
    }
}

/// Outcome of a single poll attempt, stored in `run_history.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(CoreError::InvalidRunStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountType {
    Followers,
    Followings,
}

impl CountType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CountType::Followers => "followers",
            CountType::Followings => "followings",
        }
    }
}

impl std::fmt::Display for CountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "followers" => Ok(CountType::Followers),
            "followings" => Ok(CountType::Followings),
            other => Err(CoreError::InvalidCountType(other.to_string())),
        }
    }
}

/// Kind of event recorded in the append-only `change_logs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    FollowerGained,
    FollowerLost,
    FollowingAdded,
    FollowingRemoved,
}

impl ChangeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::FollowerGained => "follower_gained",
            ChangeType::FollowerLost => "follower_lost",
            ChangeType::FollowingAdded => "following_added",
            ChangeType::FollowingRemoved => "following_removed",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
