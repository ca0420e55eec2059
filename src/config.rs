use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// How events are laid out on disk during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLayout {
    /// One shared file, header `GameTime,RealTime,EventType,Payload`.
    Unified,
    /// Four files, one per `LogCategory`, each with its own header.
    PerCategory,
}

impl Default for LogLayout {
    fn default() -> Self {
        Self::Unified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    Keyword,
    Catalog,
}

impl Default for ClassifierStrategy {
    fn default() -> Self {
        Self::Keyword
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub strategy: ClassifierStrategy,
    /// Keyword overrides. `None` keeps the built-in set for that category.
    pub weed: Option<Vec<String>>,
    pub meth: Option<Vec<String>>,
    pub cocaine: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on live actor entries; least recently used goes first.
    pub capacity: usize,
    /// Entry lifetime in seconds. 0 keeps entries until evicted by capacity.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            ttl_secs: 900,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Seconds between periodic exports. 0 disables them; shutdown still flushes.
    pub interval_secs: u64,
    /// Rows retained per category for the session summary.
    pub history_limit: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            history_limit: 50_000,
        }
    }
}

impl ExportConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub data_dir: PathBuf,
    pub layout: LogLayout,
    pub log_file_name: String,
    /// `sync_data` after every append.
    pub fsync: bool,
    pub classifier: ClassifierConfig,
    pub cache: CacheConfig,
    pub export: ExportConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("telemetry"),
            layout: LogLayout::default(),
            log_file_name: "session_events.csv".to_string(),
            fsync: false,
            classifier: ClassifierConfig::default(),
            cache: CacheConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl TelemetryConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.log_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "log_file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
