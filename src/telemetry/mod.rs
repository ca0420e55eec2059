//! Event encoding and the durable session log.
//!
//! # APPEND-ONLY INVARIANT
//! The event log only grows. Every append is one whole line, written and
//! flushed under the target's lock before the call returns.
//!
//! # FORMAT INVARIANT
//! A unified line always has exactly 4 CSV fields
//! (`GameTime,RealTime,EventType,Payload`), whatever the payload values contain.

pub mod encoder;
pub mod event;
pub mod log;
pub mod metrics;
pub mod recorder;

pub use encoder::{decode_payload, encode_payload, encode_payload_for_line, LogLine};
pub use event::{EventKind, EventRecord, LogCategory, UNIFIED_HEADER};
pub use log::EventLog;
pub use metrics::{compute_summary, SessionSummary};
pub use recorder::SessionRecorder;
