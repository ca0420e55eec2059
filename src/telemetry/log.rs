use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::encoder::{csv_field, decode_payload, quote_for_line, single_line};
use super::event::{EventKind, EventRecord, LogCategory, UNIFIED_HEADER};
use crate::config::{LogLayout, TelemetryConfig};
use crate::error::{Result, TelemetryError};

struct LogTarget {
    path: PathBuf,
    header: String,
    file: Option<File>,
}

impl LogTarget {
    fn new(path: PathBuf, header: String) -> Self {
        Self {
            path,
            header,
            file: None,
        }
    }

    /// Opens in append mode, writing the header first if the file is new or empty.
    fn ensure_open(&mut self) -> Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => self.create()?,
        };
        Ok(self.file.insert(file))
    }

    fn create(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| TelemetryError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TelemetryError::io(&self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| TelemetryError::io(&self.path, e))?
            .len();
        if len == 0 {
            file.write_all(format!("{}\n", self.header).as_bytes())
                .map_err(|e| TelemetryError::io(&self.path, e))?;
            debug!("Created {} with header", self.path.display());
        }
        Ok(file)
    }

    fn write_line(&mut self, line: &str, fsync: bool) -> Result<()> {
        let file = self.ensure_open()?;
        let written = file
            .write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .and_then(|_| if fsync { file.sync_data() } else { Ok(()) });
        if let Err(e) = written {
            // reopen on the next event
            self.file = None;
            return Err(TelemetryError::io(&self.path, e));
        }
        Ok(())
    }
}

/// Append-only event sink.
///
/// Each append is one complete line handed to the OS in a single write while
/// the target's lock is held, so concurrent callers never interleave. Files
/// only grow; nothing here truncates.
pub struct EventLog {
    layout: LogLayout,
    fsync: bool,
    // Unified: one target. PerCategory: indexed like LogCategory::ALL.
    targets: Vec<Mutex<LogTarget>>,
}

impl EventLog {
    pub fn new(config: &TelemetryConfig) -> Self {
        let dir = &config.data_dir;
        let targets = match config.layout {
            LogLayout::Unified => vec![Mutex::new(LogTarget::new(
                dir.join(&config.log_file_name),
                UNIFIED_HEADER.to_string(),
            ))],
            LogLayout::PerCategory => LogCategory::ALL
                .iter()
                .map(|category| {
                    Mutex::new(LogTarget::new(
                        dir.join(format!("{}.csv", category.file_stem())),
                        category.header(),
                    ))
                })
                .collect(),
        };

        Self {
            layout: config.layout,
            fsync: config.fsync,
            targets,
        }
    }

    /// Creates every target file (with header) up front.
    pub fn open(config: &TelemetryConfig) -> Result<Self> {
        let log = Self::new(config);
        for target in &log.targets {
            let mut target = target.lock();
            target.ensure_open()?;
            info!("Data log ready, data will be saved to: {}", target.path.display());
        }
        Ok(log)
    }

    pub fn layout(&self) -> LogLayout {
        self.layout
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.targets.iter().map(|t| t.lock().path.clone()).collect()
    }

    pub fn path_for(&self, category: LogCategory) -> PathBuf {
        self.target_for(category).lock().path.clone()
    }

    fn target_for(&self, category: LogCategory) -> &Mutex<LogTarget> {
        match self.layout {
            LogLayout::Unified => &self.targets[0],
            LogLayout::PerCategory => {
                let index = LogCategory::ALL
                    .iter()
                    .position(|c| *c == category)
                    .unwrap_or(0);
                &self.targets[index]
            }
        }
    }

    pub fn append(&self, record: &EventRecord) -> Result<()> {
        let line = match self.layout {
            LogLayout::Unified => record.to_unified_line(),
            LogLayout::PerCategory => record.to_category_row(),
        };
        self.write(record.category(), line)
    }

    /// Appends an already-encoded payload blob (`{"k":"v",...}`).
    pub fn append_encoded(
        &self,
        tag: &str,
        sim_time: &str,
        wall_time: &str,
        payload: &str,
    ) -> Result<()> {
        let kind = EventKind::from_tag(tag);
        match (self.layout, kind) {
            (LogLayout::Unified, _) => {
                let line = format!(
                    "{},{},{},{}",
                    csv_field(sim_time),
                    csv_field(wall_time),
                    csv_field(tag),
                    quote_for_line(payload)
                );
                let category = kind.map(|k| k.category()).unwrap_or(LogCategory::Sales);
                self.write(category, line)
            }
            (LogLayout::PerCategory, Some(kind)) => {
                let mut record = EventRecord::new(kind, sim_time, wall_time);
                record.fields = decode_payload(payload)?;
                self.append(&record)
            }
            (LogLayout::PerCategory, None) => {
                Err(TelemetryError::MalformedEvent("unknown event tag"))
            }
        }
    }

    fn write(&self, category: LogCategory, line: String) -> Result<()> {
        let mut line = single_line(line);
        line.push('\n');
        self.target_for(category).lock().write_line(&line, self.fsync)
    }
}

/// Reads a log file back, header included. Used by consolidation and tests.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path).map_err(|e| TelemetryError::io(path, e))?;
    Ok(raw.lines().map(|l| l.trim_end_matches('\r').to_string()).collect())
}
