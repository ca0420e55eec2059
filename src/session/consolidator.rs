use chrono::{DateTime, Local};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use super::paths::SessionPaths;
use crate::correlation::CacheStats;
use crate::error::{Result, TelemetryError};
use crate::telemetry::log::read_lines;
use crate::telemetry::metrics::{compute_summary, SessionSummary};
use crate::telemetry::recorder::RecorderSnapshot;
use crate::telemetry::LogCategory;

/// What the session hands over at shutdown.
#[derive(Debug, Clone)]
pub struct ConsolidationInput {
    pub session_id: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub snapshot: RecorderSnapshot,
    pub cache: CacheStats,
}

#[derive(Debug, Clone)]
pub struct ArchivedCategory {
    pub category: LogCategory,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub archives: Vec<ArchivedCategory>,
    pub summary: SessionSummary,
    pub summary_path: Option<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl ConsolidationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// End-of-session merge: rotating files -> archives, summary, cleanup.
///
/// Best effort. A failing step is logged and recorded in the report; later
/// steps still run. A rotating file is only deleted after its archive was written.
pub struct SessionConsolidator {
    paths: SessionPaths,
}

impl SessionConsolidator {
    pub fn new(paths: SessionPaths) -> Self {
        Self { paths }
    }

    pub fn run(&self, input: ConsolidationInput) -> ConsolidationReport {
        let at = input.ended_at;
        let mut failures = Vec::new();

        // === 1. MERGE ===
        let mut archives = Vec::new();
        let mut mergeable = Vec::new();
        for category in LogCategory::ALL {
            match self.archive_category(category, at) {
                Ok(archived) => {
                    mergeable.push(category);
                    archives.push(archived);
                }
                Err(e) => {
                    error!("Archiving {} failed: {}", category, e);
                    failures.push(format!("archive {}: {}", category, e));
                }
            }
        }

        // === 2. SUMMARIZE ===
        let summary = compute_summary(
            &input.session_id,
            input.started_at,
            input.ended_at,
            &input.snapshot,
            input.cache,
        );

        // === 3. WRITE SUMMARY ===
        let summary_path = match self.write_summary(&summary, at) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Writing session summary failed: {}", e);
                failures.push(format!("summary: {}", e));
                None
            }
        };

        // === 4. CLEANUP ===
        let mut removed = Vec::new();
        for category in mergeable {
            let path = self.paths.rotating_file(category);
            if !path.exists() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(e) => {
                    warn!("Could not delete {}: {}", path.display(), e);
                    failures.push(format!("delete {}: {}", path.display(), e));
                }
            }
        }
        // only succeeds once the directory is empty
        let _ = fs::remove_dir(self.paths.periodic_dir());

        info!(
            "Session consolidated: {} archives, {} intermediates removed, {} failures",
            archives.len(),
            removed.len(),
            failures.len()
        );

        ConsolidationReport {
            archives,
            summary,
            summary_path,
            removed,
            failures,
        }
    }

    /// Header first, then every data line of the rotating file in order,
    /// skipping header lines that periodic exports embedded mid-file.
    fn archive_category(&self, category: LogCategory, at: DateTime<Local>) -> Result<ArchivedCategory> {
        let header = category.header();
        let rotating = self.paths.rotating_file(category);

        let data: Vec<String> = if rotating.exists() {
            read_lines(&rotating)?
                .into_iter()
                .filter(|line| !line.is_empty() && *line != header)
                .collect()
        } else {
            Vec::new()
        };

        let archive_dir = self.paths.archive_dir();
        fs::create_dir_all(&archive_dir).map_err(|e| TelemetryError::io(&archive_dir, e))?;

        let mut content = String::with_capacity(header.len() + 1 + data.iter().map(|l| l.len() + 1).sum::<usize>());
        content.push_str(&header);
        content.push('\n');
        for line in &data {
            content.push_str(line);
            content.push('\n');
        }

        let path = self.paths.archive_file(category, at);
        fs::write(&path, content).map_err(|e| TelemetryError::io(&path, e))?;

        Ok(ArchivedCategory {
            category,
            path,
            rows: data.len(),
        })
    }

    fn write_summary(&self, summary: &SessionSummary, at: DateTime<Local>) -> Result<PathBuf> {
        let archive_dir = self.paths.archive_dir();
        fs::create_dir_all(&archive_dir).map_err(|e| TelemetryError::io(&archive_dir, e))?;
        let path = self.paths.summary_file(at);
        fs::write(&path, summary.render_text()).map_err(|e| TelemetryError::io(&path, e))?;
        Ok(path)
    }
}
