//! Whole-store maintenance command handlers.
//!
//! Each handler calls one `followtrack_db::maintenance` or merge entry point
//! and prints a plain summary. Errors propagate so the process exits
//! non-zero.

use std::path::Path;

use followtrack_db::{MergeReport, PurgeReport};

pub(crate) fn run_export(src: &Path, out: Option<&Path>, overwrite: bool) -> anyhow::Result<()> {
    let exported = followtrack_db::export_store(src, out, overwrite)?;
    println!("Exported store to {}", exported.display());
    Ok(())
}

/// Merge `src` into `dest`, backing `dest` up first unless told not to.
///
/// # Errors
///
/// Returns an error if either store is missing or incompatible, the two
/// paths name the same file, or any write fails (nothing is committed).
pub(crate) async fn run_merge(dest: &Path, src: &Path, backup: bool) -> anyhow::Result<()> {
    let report = followtrack_db::merge_stores(dest, src, backup).await?;

    if let Some(path) = &report.backup_path {
        println!("Backup created: {}", path.display());
    }
    println!("Merge completed.");
    for line in merge_summary_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) async fn run_preview_merge(dest: &Path, src: &Path) -> anyhow::Result<()> {
    let report = followtrack_db::preview_merge(dest, src).await?;

    println!("Merge preview (no changes applied):");
    for line in preview_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

fn merge_summary_lines(report: &MergeReport) -> [String; 2] {
    [
        format!(
            "Inserted rows -> targets: {}, run_history: {}, followers_followings: {}, counts: {}, change_logs: {}",
            report.targets_inserted,
            report.runs_inserted,
            report.membership_inserted,
            report.counts_inserted,
            report.change_log_inserted,
        ),
        format!(
            "Updated rows -> followers_followings: {}",
            report.membership_updated
        ),
    ]
}

fn preview_lines(report: &MergeReport) -> Vec<String> {
    vec![
        format!("- targets to insert: {}", report.targets_inserted),
        format!("- run_history rows to insert: {}", report.runs_inserted),
        format!(
            "- followers_followings rows to insert: {}",
            report.membership_inserted
        ),
        format!(
            "- followers_followings rows to update: {}",
            report.membership_updated
        ),
        format!("- counts rows to insert: {}", report.counts_inserted),
        format!("- change_logs rows to insert: {}", report.change_log_inserted),
    ]
}

/// Preview, or with `apply` delete, the named targets.
///
/// # Errors
///
/// Returns an error if no non-blank username is given, none of them exist
/// in the store, the store is missing, or the deletion fails.
pub(crate) async fn run_cleanup_targets(
    dest: &Path,
    usernames: &[String],
    apply: bool,
    backup: bool,
) -> anyhow::Result<()> {
    let report = followtrack_db::purge_targets(dest, usernames, apply, backup).await?;
    for line in purge_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

fn purge_lines(report: &PurgeReport) -> Vec<String> {
    let mode = if report.applied { "Applied" } else { "Preview" };
    let mut lines = vec![
        format!(
            "{mode} cleanup for targets: {}",
            report.matched_targets.join(", ")
        ),
        format!("- target rows: {}", report.targets),
        format!("- run_history rows: {}", report.runs),
        format!("- followers_followings rows: {}", report.memberships),
        format!("- counts rows: {}", report.counts),
    ];
    if !report.missing_targets.is_empty() {
        lines.push(format!(
            "Not found: {}",
            report.missing_targets.join(", ")
        ));
    }
    if let Some(path) = &report.backup_path {
        lines.push(format!("Backup created: {}", path.display()));
    }
    if !report.applied {
        lines.push("No changes applied. Re-run with --apply to execute deletion.".to_string());
    }
    lines
}

/// Print both check results; a failed check is an error.
pub(crate) async fn run_integrity_check(dest: &Path) -> anyhow::Result<()> {
    let report = followtrack_db::integrity_check(dest).await?;

    println!("quick_check: {}", report.quick_check);
    println!("integrity_check: {}", report.integrity_check);
    if report.is_ok() {
        println!("status: ok");
        Ok(())
    } else {
        println!("status: not_ok");
        anyhow::bail!("integrity check failed for {}", dest.display())
    }
}

pub(crate) async fn run_vacuum(dest: &Path) -> anyhow::Result<()> {
    let report = followtrack_db::vacuum_store(dest).await?;

    println!("VACUUM completed for: {}", dest.display());
    println!("Size before: {} bytes", report.before_bytes);
    println!("Size after: {} bytes", report.after_bytes);
    println!("Saved: {} bytes", report.saved_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn preview_lines_follow_report_fields() {
        let report = MergeReport {
            targets_inserted: 1,
            runs_inserted: 2,
            membership_inserted: 3,
            membership_updated: 4,
            counts_inserted: 5,
            change_log_inserted: 6,
            backup_path: None,
        };
        let lines = preview_lines(&report);

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "- targets to insert: 1");
        assert_eq!(lines[3], "- followers_followings rows to update: 4");
        assert_eq!(lines[5], "- change_logs rows to insert: 6");
    }

    #[test]
    fn merge_summary_separates_updates() {
        let report = MergeReport {
            membership_inserted: 7,
            membership_updated: 2,
            ..MergeReport::default()
        };
        let [inserted, updated] = merge_summary_lines(&report);

        assert!(inserted.contains("followers_followings: 7"), "{inserted}");
        assert_eq!(updated, "Updated rows -> followers_followings: 2");
    }

    #[test]
    fn purge_preview_mentions_apply_flag() {
        let report = PurgeReport {
            matched_targets: vec!["acme".to_string()],
            missing_targets: vec!["ghost".to_string()],
            targets: 1,
            runs: 3,
            memberships: 40,
            counts: 6,
            applied: false,
            backup_path: None,
        };
        let lines = purge_lines(&report);

        assert_eq!(lines[0], "Preview cleanup for targets: acme");
        assert!(lines.contains(&"Not found: ghost".to_string()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("No changes applied. Re-run with --apply to execute deletion.")
        );
    }

    #[test]
    fn applied_purge_reports_backup() {
        let report = PurgeReport {
            matched_targets: vec!["acme".to_string(), "beta".to_string()],
            targets: 2,
            applied: true,
            backup_path: Some(PathBuf::from("store.bak_20240101_000000.db")),
            ..PurgeReport::default()
        };
        let lines = purge_lines(&report);

        assert_eq!(lines[0], "Applied cleanup for targets: acme, beta");
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Backup created: store.bak_20240101_000000.db")
        );
    }
}
