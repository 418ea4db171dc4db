use std::path::PathBuf;

use crate::coverage::CoveragePolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub targets_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub lock_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub min_coverage: f64,
    pub min_reference_count: i64,
}

impl AppConfig {
    #[must_use]
    pub fn coverage_policy(&self) -> CoveragePolicy {
        CoveragePolicy {
            min_coverage: self.min_coverage,
            min_reference_count: self.min_reference_count,
        }
    }
}
