pub mod app_config;
pub mod config;
pub mod coverage;
pub mod lock;
pub mod members;
pub mod merge;
pub mod reconcile;
pub mod snapshot;
pub mod targets;
pub mod time;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use coverage::{CoveragePolicy, DEFAULT_MIN_COVERAGE, DEFAULT_MIN_REFERENCE_COUNT};
pub use lock::{LockError, PollLock};
pub use members::{ChangeType, CountType, MemberType, RunStatus};
pub use merge::MembershipTimeline;
pub use reconcile::{
    plan_reconciliation, ExistingMember, LostMember, NewMember, ReconcilePlan, RevivedMember,
    SnapshotContext,
};
pub use snapshot::{Snapshot, SnapshotError, SnapshotSource};
pub use targets::{load_targets, TargetConfig, TargetsFile};
pub use time::{format_stored, midpoint, midpoint_stored, StoredTimestamp};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid member type: {0}")]
    InvalidMemberType(String),
    #[error("invalid run status: {0}")]
    InvalidRunStatus(String),
    #[error("invalid count type: {0}")]
    InvalidCountType(String),
    #[error("unparseable stored timestamp: {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read targets file {path}: {source}")]
    TargetsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse targets file: {0}")]
    TargetsFileParse(#[from] serde_yaml::Error),

    #[error("targets validation failed: {0}")]
    Validation(String),
}
