use std::collections::HashSet;

use super::{types::Config, BatchTarget, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Sections required by serde (odin)
/// - Server port is not 0
/// - Odin API root is an http(s) URL and the period step is positive
/// - Freqmodes are unique per project and in the category table
/// - Dispatching projects have a secret and a queue configured
/// - Encrypted batch targets have a secret configured
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let api_root = config.odin.api_root.trim();
    if !(api_root.starts_with("http://") || api_root.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "odin.api_root must be an http(s) URL, got '{}'",
            config.odin.api_root
        )));
    }

    if config.odin.period_step_days == 0 {
        return Err(ConfigError::ValidationError(
            "odin.period_step_days must be at least 1".to_string(),
        ));
    }

    for project in &config.projects {
        if project.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "project name cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for freqmode in &project.freqmodes {
            if !seen.insert(*freqmode) {
                return Err(ConfigError::ValidationError(format!(
                    "project '{}' lists freqmode {} more than once",
                    project.name, freqmode
                )));
            }
        }
    }

    if !config.projects.is_empty() {
        if config.secret.is_none() {
            return Err(ConfigError::ValidationError(
                "projects are configured but [secret] is missing".to_string(),
            ));
        }
        if config.queue.is_none() {
            return Err(ConfigError::ValidationError(
                "projects are configured but [queue] is missing".to_string(),
            ));
        }
    }

    let mut seen = HashSet::new();
    for category in &config.batch.categories {
        if !seen.insert(category.freqmode) {
            return Err(ConfigError::ValidationError(format!(
                "batch category for freqmode {} is defined more than once",
                category.freqmode
            )));
        }
    }

    if config.batch.target == BatchTarget::Encrypted && config.secret.is_none() {
        return Err(ConfigError::ValidationError(
            "batch.target = \"encrypted\" requires [secret]".to_string(),
        ));
    }

    Ok(())
}
