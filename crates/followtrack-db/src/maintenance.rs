//! Whole-store maintenance: export, backup, integrity check, compaction and
//! target purge.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::{Connection, QueryBuilder, Sqlite};

use crate::targets::TargetRow;
use crate::{connect_existing, ensure_store_exists, DbError};

const FILE_STAMP: &str = "%Y%m%d_%H%M%S";
const EXPORT_DIR: &str = "exports";

// ---------------------------------------------------------------------------
// Export and backup
// ---------------------------------------------------------------------------

/// `exports/followtrack_<YYYYmmdd_HHMMSS>.db` relative to the working
/// directory.
#[must_use]
pub fn default_export_path() -> PathBuf {
    let stamp = Utc::now().format(FILE_STAMP);
    Path::new(EXPORT_DIR).join(format!("followtrack_{stamp}.db"))
}

/// Byte-copy a store to `out` (or [`default_export_path`]).
///
/// Returns the path written.
///
/// # Errors
///
/// Returns [`DbError::StoreNotFound`] if `src` is missing,
/// [`DbError::DestinationExists`] if `out` exists and `overwrite` is not set,
/// or [`DbError::Io`] if the copy fails.
pub fn export_store(src: &Path, out: Option<&Path>, overwrite: bool) -> Result<PathBuf, DbError> {
    ensure_store_exists(src)?;

    let out = out.map_or_else(default_export_path, Path::to_path_buf);
    if out.exists() && !overwrite {
        return Err(DbError::DestinationExists(out));
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DbError::io(parent, e))?;
    }

    std::fs::copy(src, &out).map_err(|e| DbError::io(&out, e))?;
    tracing::info!(src = %src.display(), out = %out.display(), "exported store");
    Ok(out)
}

/// `<stem>.bak_<YYYYmmdd_HHMMSS><ext>` beside `path`.
#[must_use]
pub fn backup_path_for(path: &Path) -> PathBuf {
    let stamp = Utc::now().format(FILE_STAMP);
    let stem = path
        .file_stem()
        .map_or_else(|| "store".into(), |s| s.to_string_lossy());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.bak_{stamp}{ext}"))
}

/// Copy `path` to [`backup_path_for`] and return the backup's path.
///
/// # Errors
///
/// Returns [`DbError::StoreNotFound`] if `path` is missing or
/// [`DbError::Io`] if the copy fails.
pub fn create_backup(path: &Path) -> Result<PathBuf, DbError> {
    ensure_store_exists(path)?;
    let backup = backup_path_for(path);
    std::fs::copy(path, &backup).map_err(|e| DbError::io(&backup, e))?;
    tracing::info!(store = %path.display(), backup = %backup.display(), "backup created");
    Ok(backup)
}

// ---------------------------------------------------------------------------
// Integrity and compaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check: String,
    pub integrity_check: String,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.quick_check == "ok" && self.integrity_check == "ok"
    }
}

/// Run SQLite's `quick_check` and `integrity_check`, stopping at the first
/// problem each finds.
///
/// # Errors
///
/// Returns [`DbError::StoreNotFound`] if `path` is missing or
/// [`DbError::Sqlx`] if the file cannot be opened or checked.
pub async fn integrity_check(path: &Path) -> Result<IntegrityReport, DbError> {
    let mut conn = connect_existing(path).await?;

    let quick_check: String = sqlx::query_scalar("PRAGMA quick_check(1)")
        .fetch_one(&mut conn)
        .await?;
    let integrity_check: String = sqlx::query_scalar("PRAGMA integrity_check(1)")
        .fetch_one(&mut conn)
        .await?;
    conn.close().await?;

    let report = IntegrityReport {
        quick_check,
        integrity_check,
    };
    if report.is_ok() {
        tracing::info!(store = %path.display(), "integrity check passed");
    } else {
        tracing::warn!(
            store = %path.display(),
            quick_check = %report.quick_check,
            integrity_check = %report.integrity_check,
            "integrity check failed"
        );
    }
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacuumReport {
    pub before_bytes: u64,
    pub after_bytes: u64,
}

impl VacuumReport {
    /// Bytes reclaimed; negative if the file grew.
    #[must_use]
    pub fn saved_bytes(&self) -> i128 {
        i128::from(self.before_bytes) - i128::from(self.after_bytes)
    }
}

fn file_size(path: &Path) -> Result<u64, DbError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| DbError::io(path, e))
}

/// Rebuild the store file with `VACUUM` and refresh planner statistics with
/// `ANALYZE`.
///
/// # Errors
///
/// Returns [`DbError::StoreNotFound`] if `path` is missing,
/// [`DbError::Sqlx`] if either statement fails, or [`DbError::Io`] if the
/// file size cannot be read.
pub async fn vacuum_store(path: &Path) -> Result<VacuumReport, DbError> {
    ensure_store_exists(path)?;
    let before_bytes = file_size(path)?;

    let mut conn = connect_existing(path).await?;
    sqlx::query("VACUUM").execute(&mut conn).await?;
    sqlx::query("ANALYZE").execute(&mut conn).await?;
    conn.close().await?;

    let report = VacuumReport {
        before_bytes,
        after_bytes: file_size(path)?,
    };
    tracing::info!(
        store = %path.display(),
        before = report.before_bytes,
        after = report.after_bytes,
        "vacuum complete"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Target purge
// ---------------------------------------------------------------------------

/// Rows owned by the matched targets; deleted only when `applied`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub matched_targets: Vec<String>,
    pub missing_targets: Vec<String>,
    pub targets: u64,
    pub runs: u64,
    pub memberships: u64,
    pub counts: u64,
    pub applied: bool,
    pub backup_path: Option<PathBuf>,
}

async fn count_owned(
    conn: &mut sqlx::SqliteConnection,
    table: &str,
    target_id: i64,
) -> Result<u64, DbError> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE target_id = ?"))
        .bind(target_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(u64::try_from(n).unwrap_or(0))
}

/// Report, and with `apply` delete, every row owned by the named targets.
///
/// Deletion covers counts, memberships, runs and the target rows in one
/// transaction. Change-log entries are not owned by a target and are kept.
///
/// # Errors
///
/// Returns [`DbError::NoTargetsGiven`] if `usernames` holds no non-blank
/// name, [`DbError::NoMatchingTargets`] if none of them exist,
/// [`DbError::StoreNotFound`] if `path` is missing, [`DbError::Io`] if the
/// backup fails, or [`DbError::Sqlx`] on storage failure.
pub async fn purge_targets(
    path: &Path,
    usernames: &[String],
    apply: bool,
    backup: bool,
) -> Result<PurgeReport, DbError> {
    let mut wanted: Vec<String> = usernames
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    wanted.sort();
    wanted.dedup();
    if wanted.is_empty() {
        return Err(DbError::NoTargetsGiven);
    }

    let mut conn = connect_existing(path).await?;

    let mut builder: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("SELECT id, username FROM targets WHERE username IN (");
    let mut separated = builder.separated(", ");
    for username in &wanted {
        separated.push_bind(username);
    }
    separated.push_unseparated(") ORDER BY username");
    let matched: Vec<TargetRow> = builder.build_query_as().fetch_all(&mut conn).await?;

    if matched.is_empty() {
        conn.close().await?;
        return Err(DbError::NoMatchingTargets(wanted));
    }

    let mut report = PurgeReport {
        matched_targets: matched.iter().map(|t| t.username.clone()).collect(),
        missing_targets: wanted
            .iter()
            .filter(|w| !matched.iter().any(|t| &t.username == *w))
            .cloned()
            .collect(),
        targets: matched.len() as u64,
        ..PurgeReport::default()
    };
    for target in &matched {
        report.runs += count_owned(&mut conn, "run_history", target.id).await?;
        report.memberships += count_owned(&mut conn, "followers_followings", target.id).await?;
        report.counts += count_owned(&mut conn, "counts", target.id).await?;
    }

    if !apply {
        conn.close().await?;
        return Ok(report);
    }

    if backup {
        report.backup_path = Some(create_backup(path)?);
    }

    let mut tx = conn.begin().await?;
    for target in &matched {
        for table in ["counts", "followers_followings", "run_history"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE target_id = ?"))
                .bind(target.id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM targets WHERE id = ?")
            .bind(target.id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    conn.close().await?;

    report.applied = true;
    tracing::info!(
        store = %path.display(),
        targets = ?report.matched_targets,
        runs = report.runs,
        memberships = report.memberships,
        counts = report.counts,
        "purged targets"
    );
    Ok(report)
}
