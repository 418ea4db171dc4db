use std::path::{Path, PathBuf};
use std::time::Duration;

use followtrack_core::{AppConfig, CoreError};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::Connection;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const BUSY_TIMEOUT_SECS: u64 = 5;

// Path relative to crates/followtrack-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Tables every timeline store must carry.
pub const STORE_TABLES: [&str; 5] = [
    "targets",
    "run_history",
    "followers_followings",
    "counts",
    "change_logs",
];

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid run transition for id {id}: expected status '{expected_status}'")]
    InvalidRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("store not found: {0}")]
    StoreNotFound(PathBuf),
    #[error("destination already exists: {0} (pass overwrite to replace it)")]
    DestinationExists(PathBuf),
    #[error("source and destination are the same store: {0}")]
    SelfMerge(PathBuf),
    #[error("{path} is not a timeline store: missing table '{table}'")]
    IncompatibleStore { path: PathBuf, table: &'static str },
    #[error("no target usernames given")]
    NoTargetsGiven,
    #[error("no matching targets found for: {}", .0.join(", "))]
    NoMatchingTargets(Vec<String>),
}

impl DbError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DbError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub mod change_logs;
pub mod counts;
pub mod maintenance;
pub mod memberships;
pub mod merge;
pub mod reconcile;
pub mod runs;
pub mod targets;
pub mod timeline;

pub use change_logs::{list_change_logs, ChangeLogRow};
pub use counts::{insert_count, list_counts, CountRow};
pub use maintenance::{
    backup_path_for, create_backup, default_export_path, export_store, integrity_check,
    purge_targets, vacuum_store, IntegrityReport, PurgeReport, VacuumReport,
};
pub use memberships::{get_membership, list_memberships, MembershipRow};
pub use merge::{merge_stores, preview_merge, MergeReport};
pub use reconcile::{reconcile_snapshot, ReconcileOutcome};
pub use runs::{
    complete_run, fail_run, get_last_run, get_run, list_runs, previous_run_started_at, start_run,
    CollectedCounts, RunRow,
};
pub use targets::{get_or_create_target, get_target_by_username, list_targets, TargetRow};
pub use timeline::{
    daily_summary, list_current_members, list_first_seen_between, list_last_seen_between,
    list_lost_between, snapshot_at, DailyChangeSummary, MemberQuery,
};

/// Connection options shared by every store handle.
///
/// Rollback-journal mode keeps a store to a single file, so export and backup
/// are plain byte copies.
#[must_use]
pub fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Delete)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
}

/// Connect to a store file, creating it if absent.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(path: &Path, config: PoolConfig) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(connect_options(path).create_if_missing(true))
        .await
}

/// Open (creating if needed) a store and bring its schema up to date.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the connection fails or
/// [`DbError::Migration`] if a migration cannot be applied.
pub async fn open_store(path: &Path, config: PoolConfig) -> Result<SqlitePool, DbError> {
    let pool = connect_pool(path, config).await?;
    let applied = run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(path = %path.display(), applied, "applied store migrations");
    }
    Ok(pool)
}

/// Open a single connection to a store that must already exist.
///
/// No migrations are run; maintenance commands work on whatever schema the
/// file carries.
///
/// # Errors
///
/// Returns [`DbError::StoreNotFound`] if `path` is not a file, or
/// [`DbError::Sqlx`] if the connection fails.
pub async fn connect_existing(path: &Path) -> Result<SqliteConnection, DbError> {
    ensure_store_exists(path)?;
    let conn = SqliteConnection::connect_with(&connect_options(path)).await?;
    Ok(conn)
}

pub(crate) fn ensure_store_exists(path: &Path) -> Result<(), DbError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DbError::StoreNotFound(path.to_path_buf()))
    }
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh store; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

pub(crate) async fn run_migrations_on(
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(conn).await
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Ping the pool and confirm every store table is present.
///
/// # Errors
///
/// Returns [`DbError::IncompatibleStore`] naming the first missing table, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn health_check(pool: &SqlitePool, path: &Path) -> Result<(), DbError> {
    ping(pool).await?;
    let mut conn = pool.acquire().await?;
    verify_store_tables(&mut conn, "main", path).await
}

/// Confirm `schema` (`main` or an attached alias) carries every store table.
pub(crate) async fn verify_store_tables(
    conn: &mut SqliteConnection,
    schema: &str,
    path: &Path,
) -> Result<(), DbError> {
    let sql = format!("SELECT name FROM {schema}.sqlite_master WHERE type = 'table'");
    let present: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;

    for table in STORE_TABLES {
        if !present.iter().any(|name| name == table) {
            return Err(DbError::IncompatibleStore {
                path: path.to_path_buf(),
                table,
            });
        }
    }
    Ok(())
}
