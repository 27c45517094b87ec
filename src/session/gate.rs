use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPhase {
    Idle,
    Analyzing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("an analysis is already in progress")]
    Busy,
}

/// Admits at most one analysis at a time: `Idle -> Analyzing -> Idle`.
#[derive(Clone)]
pub struct AnalysisGate {
    phase: Arc<Mutex<AnalysisPhase>>,
}

impl Default for AnalysisGate {
    fn default() -> Self {
        Self {
            phase: Arc::new(Mutex::new(AnalysisPhase::Idle)),
        }
    }
}

impl AnalysisGate {
    pub fn phase(&self) -> AnalysisPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Moves to `Analyzing`, or fails if an analysis is already running.
    /// The gate goes back to `Idle` when the ticket is dropped.
    pub fn try_begin(&self) -> Result<AnalysisTicket, GateError> {
        let mut phase = self.phase.lock().unwrap_or_else(|p| p.into_inner());
        if *phase == AnalysisPhase::Analyzing {
            return Err(GateError::Busy);
        }
        *phase = AnalysisPhase::Analyzing;
        debug!("analysis gate: analyzing");
        Ok(AnalysisTicket {
            phase: Arc::clone(&self.phase),
        })
    }
}

#[must_use = "the gate reopens as soon as the ticket is dropped"]
pub struct AnalysisTicket {
    phase: Arc<Mutex<AnalysisPhase>>,
}

impl Drop for AnalysisTicket {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner()) = AnalysisPhase::Idle;
        debug!("analysis gate: idle");
    }
}
