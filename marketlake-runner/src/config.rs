//! Pipeline configuration — an explicit object handed to every stage.
//!
//! No ambient globals: concurrent runs with different parameters cannot
//! interfere because each run carries its own config value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use marketlake_core::dq::DqThresholds;
use marketlake_core::window::WindowSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for pipeline runs and backfills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub contract: ContractSection,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub dq: DqSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSection {
    /// Active contract version tag, e.g. "v1".
    pub version: String,
    /// Path to the TOML contracts document.
    pub contracts_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSection {
    #[serde(default = "default_window_minutes")]
    pub minutes: u32,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            minutes: default_window_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqSection {
    /// Seconds after which an event counts as late.
    #[serde(default = "default_late_seconds")]
    pub late_seconds: i64,
    #[serde(default = "default_max_late_rate")]
    pub max_late_rate: f64,
    #[serde(default = "default_max_duplicate_rate")]
    pub max_duplicate_rate: f64,
}

impl Default for DqSection {
    fn default() -> Self {
        Self {
            late_seconds: default_late_seconds(),
            max_late_rate: default_max_late_rate(),
            max_duplicate_rate: default_max_duplicate_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Root of the local lake (bronze/silver/gold live underneath).
    pub root: PathBuf,
    /// Write attempts after the first failure before a run errors out.
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,
    /// Keep bronze/silver output of a hard-failed run for forensics.
    #[serde(default = "default_persist_on_hard_fail")]
    pub persist_on_hard_fail: bool,
}

fn default_window_minutes() -> u32 {
    5
}

fn default_late_seconds() -> i64 {
    300
}

fn default_max_late_rate() -> f64 {
    0.1
}

fn default_max_duplicate_rate() -> f64 {
    0.05
}

fn default_write_retries() -> u32 {
    2
}

fn default_persist_on_hard_fail() -> bool {
    true
}

impl PipelineConfig {
    /// Config with all defaults for the given contract source and lake root.
    pub fn new(
        version: impl Into<String>,
        contracts_path: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            contract: ContractSection {
                version: version.into(),
                contracts_path: contracts_path.into(),
            },
            window: WindowSection::default(),
            dq: DqSection::default(),
            storage: StorageSection {
                root: root.into(),
                write_retries: default_write_retries(),
                persist_on_hard_fail: default_persist_on_hard_fail(),
            },
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window_spec()?;
        if self.dq.late_seconds < 0 {
            return Err(ConfigError::Invalid(
                "dq.late_seconds must not be negative".into(),
            ));
        }
        for (name, rate) in [
            ("dq.max_late_rate", self.dq.max_late_rate),
            ("dq.max_duplicate_rate", self.dq.max_duplicate_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {rate}"
                )));
            }
        }
        Ok(())
    }

    pub fn window_spec(&self) -> Result<WindowSpec, ConfigError> {
        WindowSpec::from_minutes(self.window.minutes)
            .ok_or_else(|| ConfigError::Invalid("window.minutes must be nonzero".into()))
    }

    pub fn thresholds(&self) -> DqThresholds {
        DqThresholds {
            max_late_rate: self.dq.max_late_rate,
            max_duplicate_rate: self.dq.max_duplicate_rate,
        }
    }

    pub fn late_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dq.late_seconds)
    }
}
