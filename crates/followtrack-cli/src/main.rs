use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod maintenance;
mod poll;
mod report;

use report::ReportCommands;

#[derive(Debug, Parser)]
#[command(name = "followtrack")]
#[command(about = "Follower/following timeline tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Copy a store file to a new location
    Export {
        /// Source store (defaults to `FOLLOWTRACK_DB_PATH`)
        #[arg(long)]
        src: Option<PathBuf>,
        /// Output path (defaults to exports/followtrack_<timestamp>.db)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Replace the output file if it already exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Merge another store into the destination store
    Merge {
        /// Store to merge from
        #[arg(long)]
        src: PathBuf,
        /// Store to merge into (defaults to `FOLLOWTRACK_DB_PATH`)
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Skip the backup copy of the destination
        #[arg(long)]
        no_backup: bool,
    },
    /// Show what a merge would change without writing
    PreviewMerge {
        /// Store to merge from
        #[arg(long)]
        src: PathBuf,
        /// Store to merge into (defaults to `FOLLOWTRACK_DB_PATH`)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Preview or delete targets and every row they own
    CleanupTargets {
        /// Store to clean (defaults to `FOLLOWTRACK_DB_PATH`)
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Target usernames to remove
        #[arg(long, num_args = 1.., required = true)]
        usernames: Vec<String>,
        /// Delete the rows (default is preview only)
        #[arg(long)]
        apply: bool,
        /// Skip the backup copy when applying
        #[arg(long)]
        no_backup: bool,
    },
    /// Run `SQLite` quick_check and integrity_check
    IntegrityCheck {
        /// Store to check (defaults to `FOLLOWTRACK_DB_PATH`)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Run `SQLite` VACUUM and ANALYZE
    Vacuum {
        /// Store to compact (defaults to `FOLLOWTRACK_DB_PATH`)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Take one snapshot of each target and reconcile it into the store
    Poll {
        /// Target to poll; repeat for several (defaults to the targets file)
        #[arg(long = "target")]
        targets: Vec<String>,
        /// Directory holding collector snapshots (defaults to `FOLLOWTRACK_SNAPSHOT_DIR`)
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Read-only reports over stored timelines
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check that the store opens and answers
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = followtrack_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let Some(command) = cli.command else {
        println!("followtrack: no command given; see --help");
        return Ok(());
    };

    let store = |path: Option<PathBuf>| path.unwrap_or_else(|| config.db_path.clone());

    match command {
        Commands::Export {
            src,
            out,
            overwrite,
        } => maintenance::run_export(&store(src), out.as_deref(), overwrite),
        Commands::Merge {
            src,
            dest,
            no_backup,
        } => maintenance::run_merge(&store(dest), &src, !no_backup).await,
        Commands::PreviewMerge { src, dest } => {
            maintenance::run_preview_merge(&store(dest), &src).await
        }
        Commands::CleanupTargets {
            dest,
            usernames,
            apply,
            no_backup,
        } => maintenance::run_cleanup_targets(&store(dest), &usernames, apply, !no_backup).await,
        Commands::IntegrityCheck { dest } => maintenance::run_integrity_check(&store(dest)).await,
        Commands::Vacuum { dest } => maintenance::run_vacuum(&store(dest)).await,
        Commands::Poll {
            targets,
            snapshot_dir,
        } => {
            let pool = open_pool(&config).await?;
            let result = poll::run_poll(&pool, &config, targets, snapshot_dir).await;
            pool.close().await;
            result
        }
        Commands::Report { command } => {
            let pool = open_pool(&config).await?;
            let result = report::run_report(&pool, command).await;
            pool.close().await;
            result
        }
        Commands::Db { command } => run_db(&config, command).await,
    }
}

async fn open_pool(config: &followtrack_core::AppConfig) -> anyhow::Result<sqlx::SqlitePool> {
    let pool = followtrack_db::open_store(
        &config.db_path,
        followtrack_db::PoolConfig::from_app_config(config),
    )
    .await?;
    Ok(pool)
}

async fn run_db(config: &followtrack_core::AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = followtrack_db::connect_pool(
        &config.db_path,
        followtrack_db::PoolConfig::from_app_config(config),
    )
    .await?;

    let result = match command {
        DbCommands::Migrate => match followtrack_db::run_migrations(&pool).await {
            Ok(applied) => {
                println!(
                    "migrations up to date for {} ({applied} applied)",
                    config.db_path.display()
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        },
        DbCommands::Ping => match followtrack_db::health_check(&pool, &config.db_path).await {
            Ok(()) => {
                println!("store ok: {}", config.db_path.display());
                Ok(())
            }
            Err(err) => Err(err.into()),
        },
    };

    pool.close().await;
    result
}
