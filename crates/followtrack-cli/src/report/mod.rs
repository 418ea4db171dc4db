//! Read-only report command handlers.
//!
//! Every subcommand queries the store through `followtrack_db::timeline` and
//! prints a fixed-width table; `list` can also write its rows as JSON.

mod query;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Subcommand, ValueEnum};
use followtrack_core::{MemberType, StoredTimestamp};

/// Sub-commands available under `report`.
#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    /// Members currently present
    List {
        #[arg(long = "type", value_enum, default_value_t = TypeFilter::Both)]
        member_type: TypeFilter,
        /// Only this target
        #[arg(long)]
        target: Option<String>,
        /// Also write the rows to this JSON file
        #[arg(long)]
        out_json: Option<PathBuf>,
    },
    /// Members first seen within a time range
    New {
        /// Range start (RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`)
        #[arg(long, value_parser = parse_time)]
        from: DateTime<Utc>,
        /// Range end, inclusive
        #[arg(long, value_parser = parse_time)]
        to: DateTime<Utc>,
        #[arg(long = "type", value_enum, default_value_t = TypeFilter::Both)]
        member_type: TypeFilter,
        #[arg(long)]
        target: Option<String>,
    },
    /// Members confirmed lost within a time range
    Lost {
        #[arg(long, value_parser = parse_time)]
        from: DateTime<Utc>,
        #[arg(long, value_parser = parse_time)]
        to: DateTime<Utc>,
        #[arg(long = "type", value_enum, default_value_t = TypeFilter::Both)]
        member_type: TypeFilter,
        #[arg(long)]
        target: Option<String>,
    },
    /// Member set as it stood at a point in time
    Snapshot {
        /// Point in time (defaults to now)
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,
        #[arg(long = "type", value_enum, default_value_t = TypeFilter::Both)]
        member_type: TypeFilter,
        #[arg(long)]
        target: Option<String>,
    },
    /// Daily gains and losses over the last N days
    Summary {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long)]
        target: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeFilter {
    Followers,
    Followings,
    Both,
}

impl TypeFilter {
    fn member_type(self) -> Option<MemberType> {
        match self {
            TypeFilter::Followers => Some(MemberType::Follower),
            TypeFilter::Followings => Some(MemberType::Following),
            TypeFilter::Both => None,
        }
    }
}

/// Accepts the same layouts as stored timestamps, including a bare date.
/// Naive values are UTC.
fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    StoredTimestamp::parse(raw)
        .map(|ts| ts.to_utc())
        .map_err(|e| e.to_string())
}

/// `YYYY-MM-DD HH:MM:SS`, or `-` when absent.
fn fmt_time(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || "-".to_string(),
        |v| v.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

pub(crate) async fn run_report(
    pool: &sqlx::SqlitePool,
    command: ReportCommands,
) -> anyhow::Result<()> {
    match command {
        ReportCommands::List {
            member_type,
            target,
            out_json,
        } => {
            query::run_list(
                pool,
                target.as_deref(),
                member_type.member_type(),
                out_json.as_deref(),
            )
            .await
        }
        ReportCommands::New {
            from,
            to,
            member_type,
            target,
        } => query::run_new(pool, target.as_deref(), member_type.member_type(), from, to).await,
        ReportCommands::Lost {
            from,
            to,
            member_type,
            target,
        } => query::run_lost(pool, target.as_deref(), member_type.member_type(), from, to).await,
        ReportCommands::Snapshot {
            at,
            member_type,
            target,
        } => {
            let at = at.unwrap_or_else(Utc::now);
            query::run_snapshot(pool, target.as_deref(), member_type.member_type(), at).await
        }
        ReportCommands::Summary { days, target } => {
            query::run_summary(pool, target.as_deref(), days).await
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn bare_date_is_midnight_utc() {
        assert_eq!(
            parse_time("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        assert_eq!(
            parse_time("2024-03-01T12:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn naive_datetime_is_read_as_utc() {
        assert_eq!(
            parse_time("2024-03-01 08:30:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
        );
    }

    #[test]
    fn garbage_time_is_rejected() {
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn type_filter_maps_to_member_type() {
        assert_eq!(
            TypeFilter::Followers.member_type(),
            Some(MemberType::Follower)
        );
        assert_eq!(
            TypeFilter::Followings.member_type(),
            Some(MemberType::Following)
        );
        assert_eq!(TypeFilter::Both.member_type(), None);
    }

    #[test]
    fn missing_time_prints_dash() {
        assert_eq!(fmt_time(None), "-");
        assert_eq!(
            fmt_time(Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())),
            "2024-01-02 03:04:05"
        );
    }
}
