//! Optional TOML configuration shared by both command-line tools.
//!
//! Config keys (TOML): `server`, `polling`, `processes`, `types`,
//! `segmentation`. Every key is optional; command-line flags override what
//! is loaded here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::group::{GROUP_ANALYSIS_PROCESS, GroupSettings, ReferenceTable, SITES_TYPE};
use crate::polling::PollSettings;
use crate::remote::Credentials;

pub const DEFAULT_SERVER: &str = "http://localhost:8000";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config at {path}: polling interval must be at least one second")]
    ZeroInterval { path: PathBuf },
    #[error("Config at {path}: max_polls must be at least 1")]
    ZeroMaxPolls { path: PathBuf },
    #[error(transparent)]
    AppDir(#[from] AppDirError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub processes: ProcessSlugs,
    #[serde(default)]
    pub types: TypeTags,
    /// Organism to segmentation reference slug.
    #[serde(default)]
    pub segmentation: ReferenceTable,
}

/// Config keys: `url`, `username`, `password`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server")]
    pub url: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server(),
            username: default_username(),
            password: default_password(),
        }
    }
}

/// Config keys: `interval_secs`, `max_polls`, `timeout_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub max_polls: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_polls: None,
            timeout_secs: None,
        }
    }
}

/// Process slugs submitted by the pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSlugs {
    #[serde(default = "default_upload_reads")]
    pub upload_reads: String,
    #[serde(default = "default_upload_annotation")]
    pub upload_annotation: String,
    #[serde(default = "default_demultiplex")]
    pub demultiplex: String,
    #[serde(default = "default_group_analysis")]
    pub group_analysis: String,
}

impl Default for ProcessSlugs {
    fn default() -> Self {
        Self {
            upload_reads: default_upload_reads(),
            upload_annotation: default_upload_annotation(),
            demultiplex: default_demultiplex(),
            group_analysis: default_group_analysis(),
        }
    }
}

/// Data type tags used to pick job outputs apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeTags {
    #[serde(default = "default_demultiplex_output")]
    pub demultiplex_output: String,
    #[serde(default = "default_annotation")]
    pub annotation: String,
    #[serde(default = "default_sites")]
    pub sites: String,
}

impl Default for TypeTags {
    fn default() -> Self {
        Self {
            demultiplex_output: default_demultiplex_output(),
            annotation: default_annotation(),
            sites: default_sites(),
        }
    }
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

fn default_interval_secs() -> u64 {
    crate::polling::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_upload_reads() -> String {
    "upload-fastq-single".to_string()
}

fn default_upload_annotation() -> String {
    "upload-iclip-annotation".to_string()
}

fn default_demultiplex() -> String {
    "workflow-icount-demultiplex".to_string()
}

fn default_group_analysis() -> String {
    GROUP_ANALYSIS_PROCESS.to_string()
}

fn default_demultiplex_output() -> String {
    "data:demultiplex:icount:".to_string()
}

fn default_annotation() -> String {
    "data:icount:annotsample:".to_string()
}

fn default_sites() -> String {
    SITES_TYPE.to_string()
}

impl Config {
    /// Load `explicit` if given, otherwise `config.toml` in the app directory.
    ///
    /// A missing default file yields the built-in defaults; a path named
    /// explicitly must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = app_dirs::config_file()?;
                if !path.exists() {
                    tracing::debug!("No config at {}; using defaults", path.display());
                    return Ok(Self::default());
                }
                Self::load_from(&path)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        if config.polling.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                path: path.to_path_buf(),
            });
        }
        if config.polling.max_polls == Some(0) {
            return Err(ConfigError::ZeroMaxPolls {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.server.username.clone(),
            password: self.server.password.clone(),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.polling.interval_secs),
            max_polls: self.polling.max_polls,
            timeout: self.polling.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn group_settings(&self) -> GroupSettings {
        GroupSettings {
            process: self.processes.group_analysis.clone(),
            sites_type: self.types.sites.clone(),
            references: self.segmentation.clone(),
        }
    }
}
