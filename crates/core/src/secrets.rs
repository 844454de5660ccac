//! Resolution of the shared job-address secret.

use std::fs;

use tracing::debug;

use crate::config::{ConfigError, SecretConfig};

/// Read the base64 secret text named by `config`.
///
/// Missing or empty values are configuration errors; the caller is expected
/// to do this before any network traffic.
pub fn resolve_secret(config: &SecretConfig) -> Result<String, ConfigError> {
    let value = match config {
        SecretConfig::Env { name } => {
            debug!(variable = %name, "Reading secret from environment");
            std::env::var(name).map_err(|_| {
                ConfigError::Secret(format!("{} is a required environment variable", name))
            })?
        }
        SecretConfig::File { path } => {
            debug!(path = %path.display(), "Reading secret from file");
            fs::read_to_string(path).map_err(|e| {
                ConfigError::Secret(format!("cannot read {}: {}", path.display(), e))
            })?
        }
    };

    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ConfigError::Secret("secret value is empty".to_string()));
    }
    Ok(value)
}
