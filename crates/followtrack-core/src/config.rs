use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so only malformed values fail.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let db_path = PathBuf::from(or_default("FOLLOWTRACK_DB_PATH", "followtrack.db"));
    let log_level = or_default("FOLLOWTRACK_LOG_LEVEL", "info");
    let targets_path = PathBuf::from(or_default(
        "FOLLOWTRACK_TARGETS_PATH",
        "./config/targets.yaml",
    ));
    let snapshot_dir = PathBuf::from(or_default("FOLLOWTRACK_SNAPSHOT_DIR", "./snapshots"));
    let lock_path = PathBuf::from(or_default("FOLLOWTRACK_LOCK_PATH", "followtrack.lock"));

    let db_max_connections = parse_u32("FOLLOWTRACK_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("FOLLOWTRACK_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("FOLLOWTRACK_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let min_coverage = or_default("FOLLOWTRACK_MIN_COVERAGE", "0.9")
        .parse::<f64>()
        .map_err(|e| invalid("FOLLOWTRACK_MIN_COVERAGE", e.to_string()))?;
    if !(0.0..=1.0).contains(&min_coverage) {
        return Err(invalid(
            "FOLLOWTRACK_MIN_COVERAGE",
            format!("{min_coverage} is outside 0.0..=1.0"),
        ));
    }
    let min_reference_count = parse_i64("FOLLOWTRACK_MIN_REFERENCE_COUNT", "100")?;

    Ok(AppConfig {
        db_path,
        log_level,
        targets_path,
        snapshot_dir,
        lock_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        min_coverage,
        min_reference_count,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
