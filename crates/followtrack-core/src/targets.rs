use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub username: String,
    /// Skip this target during polls without removing its history.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub notes: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TargetsFile {
    pub targets: Vec<TargetConfig>,
}

impl TargetsFile {
    /// Usernames of the targets a poll should visit, in file order.
    #[must_use]
    pub fn enabled_usernames(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.username.trim().to_string())
            .collect()
    }
}

/// Load and validate the tracked targets from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_targets(path: &Path) -> Result<TargetsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TargetsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_targets(&content)
}

fn parse_targets(content: &str) -> Result<TargetsFile, ConfigError> {
    let targets_file: TargetsFile = serde_yaml::from_str(content)?;
    validate_targets(&targets_file)?;
    Ok(targets_file)
}

fn validate_targets(targets_file: &TargetsFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for target in &targets_file.targets {
        let username = target.username.trim();
        if username.is_empty() {
            return Err(ConfigError::Validation(
                "target username must be non-empty".to_string(),
            ));
        }

        if !seen.insert(username.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate target username: '{username}'"
            )));
        }
    }

    Ok(())
}
