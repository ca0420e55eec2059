use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::telemetry::LogCategory;

pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// File locations under the session's data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub data_dir: PathBuf,
}

impl SessionPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn periodic_dir(&self) -> PathBuf {
        self.data_dir.join("periodic")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join("archive")
    }

    pub fn rotating_file(&self, category: LogCategory) -> PathBuf {
        self.periodic_dir()
            .join(format!("{}_rotating.csv", category.file_stem()))
    }

    pub fn archive_file(&self, category: LogCategory, at: DateTime<Local>) -> PathBuf {
        self.archive_dir().join(format!(
            "{}_{}_final.csv",
            category.file_stem(),
            at.format(ARCHIVE_TIMESTAMP_FORMAT)
        ))
    }

    pub fn summary_file(&self, at: DateTime<Local>) -> PathBuf {
        self.archive_dir().join(format!(
            "session_summary_{}.txt",
            at.format(ARCHIVE_TIMESTAMP_FORMAT)
        ))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
