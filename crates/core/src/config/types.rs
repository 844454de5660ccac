use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub odin: OdinConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub secret: Option<SecretConfig>,
    #[serde(default)]
    pub queue: Option<QueueConfig>,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Watermark database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("odin-jobs.db")
}

/// Odin REST API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OdinConfig {
    /// API root, e.g. "https://odin-smr.org"
    pub api_root: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Days requested per period-index page (default: 365)
    #[serde(default = "default_period_step")]
    pub period_step_days: u32,
}

fn default_timeout() -> u32 {
    30
}

fn default_period_step() -> u32 {
    365
}

/// Where the job-address encryption key is read from.
///
/// The value is base64 text; it is resolved once at startup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SecretConfig {
    /// Read from the named environment variable
    Env { name: String },
    /// Read from a file (trailing whitespace is trimmed)
    File { path: PathBuf },
}

/// Job queue service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Base URL of the queue service
    pub url: String,
    /// Message group attached to every job (default: "OdinLevel2Job")
    #[serde(default = "default_message_group")]
    pub message_group_id: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_message_group() -> String {
    "OdinLevel2Job".to_string()
}

/// A processing project and the freqmodes it dispatches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub freqmodes: Vec<u32>,
    /// Explicit queue names; freqmodes not listed here get a derived name.
    #[serde(default)]
    pub queues: Vec<QueueBinding>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct QueueBinding {
    pub freqmode: u32,
    pub name: String,
}

impl ProjectConfig {
    /// Queue name for a freqmode of this project.
    pub fn queue_for(&self, freqmode: u32) -> String {
        self.queues
            .iter()
            .find(|q| q.freqmode == freqmode)
            .map(|q| q.name.clone())
            .unwrap_or_else(|| {
                format!(
                    "OdinSMRLevel2Queue-{}-{}",
                    self.name.replace('.', "-"),
                    freqmode
                )
            })
    }

    /// Every (freqmode, queue) pair, explicit bindings included even when
    /// the freqmode is not repeated in `freqmodes`.
    pub fn targets(&self) -> Vec<(u32, String)> {
        let mut freqmodes = self.freqmodes.clone();
        for binding in &self.queues {
            if !freqmodes.contains(&binding.freqmode) {
                freqmodes.push(binding.freqmode);
            }
        }
        freqmodes
            .into_iter()
            .map(|fm| (fm, self.queue_for(fm)))
            .collect()
    }
}

/// Batch routing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// API root used to build level1 source addresses
    #[serde(default = "default_batch_api_root")]
    pub api_root: String,
    #[serde(default)]
    pub target: BatchTarget,
    /// Category table; the built-in table is used when empty
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            api_root: default_batch_api_root(),
            target: BatchTarget::default(),
            categories: Vec::new(),
        }
    }
}

fn default_batch_api_root() -> String {
    "https://odin-smr.org/rest_api".to_string()
}

/// What a batch-routed job carries as its target.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchTarget {
    /// The project name
    #[default]
    Project,
    /// An encrypted level2 submit address
    Encrypted,
}

/// Routing entry for one freqmode.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CategoryConfig {
    pub freqmode: u32,
    pub tag: String,
    pub project: String,
    /// Inversion mode of the processing image, if relevant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inv_mode: Option<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub odin: OdinConfig,
    pub secret_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueConfig>,
    pub projects: Vec<ProjectConfig>,
    pub batch: BatchConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            odin: config.odin.clone(),
            secret_configured: config.secret.is_some(),
            queue: config.queue.clone(),
            projects: config.projects.clone(),
            batch: config.batch.clone(),
        }
    }
}
