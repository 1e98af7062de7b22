//! logwheel-config: Policy file loading and validation.
//!
//! The config file is TOML with one table per policy:
//!
//! ```toml
//! [nginx]
//! Directory = "/var/log/nginx"
//! FilePattern = '^.*\.log$'
//! KeepFiles = 4
//! Timer = "0 * * * *"
//! MinAge = "1d"
//! FirstCompress = 2
//! Simulation = false
//! ```

pub mod duration;
pub mod policy;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use logwheel_cron::{Schedule, ScheduleError};

pub use policy::{Retention, RotationPolicy};

/// Schedule used when a policy has no `Timer`.
pub const DEFAULT_TIMER: &str = "0 * * * *";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid Timer in section [{section}]: {source}")]
    Timer {
        section: String,
        #[source]
        source: ScheduleError,
    },
    #[error("invalid value {key} in section [{section}]: {reason}")]
    InvalidValue {
        section: String,
        key: &'static str,
        reason: String,
    },
    #[error("no sections found in config file")]
    NoPolicies,
}

/// One policy section as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PolicyConfig {
    /// Directory scanned for candidate files.
    pub directory: PathBuf,
    /// Regex matched against bare file names.
    pub file_pattern: String,
    /// Generations to keep (`-1` delete, `0` truncate only).
    #[serde(default = "default_keep_files")]
    pub keep_files: i64,
    /// Five-field schedule expression.
    #[serde(default = "default_timer")]
    pub timer: String,
    /// Minimum file age before rotation (`30m`, `1d`, ...).
    #[serde(default = "default_min_age")]
    pub min_age: String,
    /// First generation index that gets compressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_compress: Option<i64>,
    /// Log actions instead of touching the filesystem.
    #[serde(default)]
    pub simulation: bool,
}

fn default_keep_files() -> i64 {
    -1
}

fn default_timer() -> String {
    DEFAULT_TIMER.to_string()
}

fn default_min_age() -> String {
    "0m".to_string()
}

impl PolicyConfig {
    /// Validate this section and build the runtime policy.
    pub fn to_policy(&self, section: &str) -> Result<RotationPolicy, ConfigError> {
        let invalid = |key: &'static str, reason: String| ConfigError::InvalidValue {
            section: section.to_string(),
            key,
            reason,
        };

        if self.directory.as_os_str().is_empty() {
            return Err(invalid("Directory", "must not be empty".into()));
        }

        if let Err(e) = regex::Regex::new(&self.file_pattern) {
            return Err(invalid("FilePattern", e.to_string()));
        }

        let retention = Retention::from_keep_files(self.keep_files)
            .ok_or_else(|| invalid("KeepFiles", format!("{} is below -1", self.keep_files)))?;

        let min_age = duration::parse_age(&self.min_age).ok_or_else(|| {
            invalid(
                "MinAge",
                format!(
                    "'{}' is not a number followed by one of m, h, d, w, M, y",
                    self.min_age
                ),
            )
        })?;

        let first_compress = match self.first_compress {
            None => None,
            Some(n) => Some(
                u32::try_from(n)
                    .map_err(|_| invalid("FirstCompress", format!("{n} is not a generation index")))?,
            ),
        };

        let mut schedule = Schedule::new();
        schedule
            .parse(&self.timer)
            .map_err(|source| ConfigError::Timer {
                section: section.to_string(),
                source,
            })?;

        Ok(RotationPolicy {
            name: section.to_string(),
            directory: self.directory.clone(),
            file_pattern: self.file_pattern.clone(),
            min_age,
            retention,
            simulation: self.simulation,
            first_compress,
            schedule,
        })
    }
}

/// Top-level configuration: policy sections keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogwheelConfig {
    pub policies: BTreeMap<String, PolicyConfig>,
}

impl LogwheelConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate every section, in name order.
    ///
    /// Fails on the first invalid section or when there are none.
    pub fn to_policies(&self) -> Result<Vec<RotationPolicy>, ConfigError> {
        if self.policies.is_empty() {
            return Err(ConfigError::NoPolicies);
        }
        self.policies
            .iter()
            .map(|(name, section)| section.to_policy(name))
            .collect()
    }
}

/// Load configuration from a file.
pub fn load_config_from(path: &Path) -> Result<LogwheelConfig, ConfigError> {
    tracing::debug!("Loading config from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    LogwheelConfig::from_toml_str(&content)
}

/// Load and validate the policies of a config file.
pub fn load_policies(path: &Path) -> Result<Vec<RotationPolicy>, ConfigError> {
    let policies = load_config_from(path)?.to_policies()?;
    tracing::debug!("Loaded {} policies from {}", policies.len(), path.display());
    Ok(policies)
}
