// crates/loom-core/src/core/signal.rs
// ============================================================================
// Module: Loom Signal Names
// Description: Deterministic signal naming for run coordination.
// Purpose: Route step completion, retry, and input updates to suspended runs.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! Signals are the only synchronization primitive between the orchestration
//! service and a suspended run. Names are deterministic and case-sensitive so
//! that a migrator callback carrying `(callbackId, eventName)` verbatim routes
//! unambiguously to the single waiter interested in it:
//! - `step-completed:<stepName>:<candidateId>`
//! - `retry-step:<stepName>:<candidateId>`
//! - `update-inputs:<candidateId>`

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::CandidateId;
use crate::core::identifiers::StepName;

// ============================================================================
// SECTION: Signal Name
// ============================================================================

/// Named signal routed to a suspended run.
///
/// # Invariants
/// - Names built by the constructors below are deterministic and case-sensitive.
/// - Equality is byte equality; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalName(String);

impl SignalName {
    /// Creates a signal name from a raw string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the completion signal name for a step of a candidate.
    #[must_use]
    pub fn step_completed(step: &StepName, candidate: &CandidateId) -> Self {
        Self(format!("step-completed:{step}:{candidate}"))
    }

    /// Returns the retry signal name for a step of a candidate.
    #[must_use]
    pub fn retry_step(step: &StepName, candidate: &CandidateId) -> Self {
        Self(format!("retry-step:{step}:{candidate}"))
    }

    /// Returns the metadata update signal name for a candidate.
    #[must_use]
    pub fn update_inputs(candidate: &CandidateId) -> Self {
        Self(format!("update-inputs:{candidate}"))
    }

    /// Returns the signal name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Signal delivered to a run, unblocking a matching wait.
///
/// # Invariants
/// - `payload` is opaque JSON interpreted by the waiting program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Signal name the waiter matched on.
    pub name: SignalName,
    /// Optional JSON payload carried by the signal.
    pub payload: Option<Value>,
}
