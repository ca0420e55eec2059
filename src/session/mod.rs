//! Session lifecycle: INIT -> ACTIVE -> SHUTTING_DOWN -> TERMINATED.
//!
//! Periodic export runs while ACTIVE. Consolidation runs once, synchronously,
//! on the way to TERMINATED.

pub mod consolidator;
pub mod exporter;
pub mod lifecycle;
pub mod paths;

pub use consolidator::{ArchivedCategory, ConsolidationInput, ConsolidationReport, SessionConsolidator};
pub use exporter::{ExportBatch, ExportReport, PeriodicExporter};
pub use lifecycle::{SessionGraph, SessionPhase, SessionRequest};
pub use paths::SessionPaths;
