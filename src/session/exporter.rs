use std::fs::{self, OpenOptions};
use std::io::Write;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::paths::SessionPaths;
use crate::error::{Result, TelemetryError};
use crate::telemetry::LogCategory;

#[derive(Debug, Clone)]
pub struct ExportBatch {
    pub category: LogCategory,
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub batches: u64,
    pub rows: u64,
    pub failures: u64,
}

/// Appends `header + rows` to the category's rotating file in one write.
pub fn write_batch(paths: &SessionPaths, batch: &ExportBatch) -> Result<()> {
    let dir = paths.periodic_dir();
    fs::create_dir_all(&dir).map_err(|e| TelemetryError::io(&dir, e))?;

    let path = paths.rotating_file(batch.category);
    let mut chunk = batch.category.header();
    chunk.push('\n');
    for row in &batch.rows {
        chunk.push_str(row);
        chunk.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| TelemetryError::io(&path, e))?;
    file.write_all(chunk.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| TelemetryError::io(&path, e))
}

/// Periodic export, driven by the host's update cadence.
///
/// The host path only decides whether an export is due and enqueues the drained
/// rows. File I/O happens on a dedicated worker thread.
pub struct PeriodicExporter {
    interval: Option<Duration>,
    last_export: Instant,
    tx: Option<mpsc::UnboundedSender<ExportBatch>>,
    worker: Option<JoinHandle<ExportReport>>,
}

impl PeriodicExporter {
    pub fn spawn(paths: SessionPaths, interval: Option<Duration>, now: Instant) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ExportBatch>();

        let worker = std::thread::Builder::new()
            .name("telemetry-export".to_string())
            .spawn(move || {
                let mut report = ExportReport::default();
                while let Some(batch) = rx.blocking_recv() {
                    report.batches += 1;
                    match write_batch(&paths, &batch) {
                        Ok(()) => {
                            report.rows += batch.rows.len() as u64;
                            debug!("Exported {} {} rows", batch.rows.len(), batch.category);
                        }
                        Err(e) => {
                            report.failures += 1;
                            error!("Periodic export of {} failed: {}", batch.category, e);
                        }
                    }
                }
                report
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Could not start export worker, periodic export disabled: {}", e);
                None
            }
        };

        Self {
            interval,
            last_export: now,
            tx: worker.as_ref().map(|_| tx),
            worker,
        }
    }

    /// True once per elapsed interval. Never due when export is disabled.
    pub fn is_due(&mut self, now: Instant) -> bool {
        match self.interval {
            Some(interval) if now.saturating_duration_since(self.last_export) >= interval => {
                self.last_export = now;
                true
            }
            _ => false,
        }
    }

    pub fn enqueue(&self, batches: Vec<(LogCategory, Vec<String>)>) -> usize {
        let Some(tx) = &self.tx else {
            return 0;
        };
        let mut sent = 0;
        for (category, rows) in batches {
            if tx.send(ExportBatch { category, rows }).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Closes the queue and waits until every enqueued batch is on disk.
    pub fn stop(&mut self) -> ExportReport {
        self.tx = None;
        let report = match self.worker.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(_)) => {
                error!("Export worker panicked");
                ExportReport::default()
            }
            None => ExportReport::default(),
        };
        info!(
            "Periodic export stopped: {} batches, {} rows, {} failures",
            report.batches, report.rows, report.failures
        );
        report
    }
}

impl Drop for PeriodicExporter {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}
