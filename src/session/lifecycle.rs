use serde::{Deserialize, Serialize};

/// Lifecycle of one telemetry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Constructed, log not opened yet.
    Init,
    /// Events flow; periodic export may fire.
    Active,
    /// Consolidation is running. Entered exactly once.
    ShuttingDown,
    /// Final. A new session needs a new context (and starts with an empty cache).
    Terminated,
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::Init
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    Start,
    Shutdown,
    ConsolidationFinished,
}

pub struct SessionGraph;

impl SessionGraph {
    /// Pure function: (Current Phase, Request) -> New Phase.
    /// `None` means the request is ignored in this phase.
    pub fn transition(current: SessionPhase, request: SessionRequest) -> Option<SessionPhase> {
        use SessionPhase::*;
        use SessionRequest::*;

        match (current, request) {
            (Init, Start) => Some(Active),
            (Init, Shutdown) => Some(Terminated), // nothing was ever written
            (Active, Shutdown) => Some(ShuttingDown),
            (ShuttingDown, ConsolidationFinished) => Some(Terminated),
            // no re-entry from ShuttingDown or Terminated
            _ => None,
        }
    }

    pub fn accepts_events(phase: SessionPhase) -> bool {
        phase == SessionPhase::Active
    }
}
