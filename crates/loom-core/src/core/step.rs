// crates/loom-core/src/core/step.rs
// ============================================================================
// Module: Loom Step State and Telemetry
// Description: Step status machine, callback events, and telemetry records.
// Purpose: Capture observable run evolution for read APIs and metrics.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Step state is a derived view: the projection of the engine's run state
//! joined with the migration's step template. The only separately persisted
//! records are the append-only [`StepEventRecord`] telemetry rows consumed by
//! the metrics read path; the run sequencer never reads them back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CandidateId;
use crate::core::identifiers::MigrationId;
use crate::core::identifiers::StepName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Step Status
// ============================================================================

/// Observable status of one step within a run.
///
/// # Invariants
/// - `in_progress` -> {`succeeded` | `failed` | `merged`} is the only legal
///   terminal transition.
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Non-terminal intermediate update reported by the migrator.
    Pending,
    /// Step has been dispatched and is awaiting completion.
    InProgress,
    /// Step finished successfully.
    Succeeded,
    /// Step failed; the run holds until retried or cancelled.
    Failed,
    /// Step's pull request was merged (successful terminal state).
    Merged,
}

impl StepStatus {
    /// Returns true when the status is terminal for the step.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Merged)
    }

    /// Returns true when the status is a successful terminal state.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::Merged)
    }

    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Merged => "merged",
        }
    }

    /// Parses a stable wire label back into a status.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Step State
// ============================================================================

/// Derived state of one step, surfaced through the run status view.
///
/// # Invariants
/// - Within one run, each step name appears at most once in the view;
///   updates replace the entry in place.
/// - `metadata` accumulates across intermediate updates (`prUrl`,
///   `instructions`, `commitSha`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    /// Step name.
    pub step_name: StepName,
    /// Candidate the step belongs to.
    pub candidate_id: CandidateId,
    /// Current step status.
    pub status: StepStatus,
    /// Accumulated step metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl StepState {
    /// Merges incoming metadata into the accumulated map, overwriting
    /// existing keys.
    pub fn merge_metadata(&mut self, incoming: &BTreeMap<String, String>) {
        for (key, value) in incoming {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}

// ============================================================================
// SECTION: Callback Events
// ============================================================================

/// Step status event posted back by a migrator worker.
///
/// # Invariants
/// - `step_name` and `candidate_id` select the completion signal the run is
///   suspended on; the payload is delivered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStatusEvent {
    /// Step the event refers to.
    pub step_name: StepName,
    /// Candidate the event refers to.
    pub candidate_id: CandidateId,
    /// Reported step status.
    pub status: StepStatus,
    /// Event metadata merged into the step state.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Runtime status of a run as reported by the execution engine.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeStatus {
    /// Run is executing or suspended at a wait point.
    Running,
    /// Run completed every step.
    Completed,
    /// Run failed or was cancelled.
    Failed,
    /// Engine cannot determine the run's state.
    Unknown,
}

/// Run status snapshot returned by the execution engine.
///
/// # Invariants
/// - `steps` preserves first-dispatch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusReport {
    /// Engine-level runtime status.
    pub runtime_status: RuntimeStatus,
    /// Per-step derived state in first-dispatch order.
    pub steps: Vec<StepState>,
}

// ============================================================================
// SECTION: Telemetry Records
// ============================================================================

/// Source of a telemetry record.
///
/// # Invariants
/// - Variants are stable for serialization and store round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEventType {
    /// Written by the run sequencer around step dispatch and completion;
    /// terminal records carry measured durations.
    Dispatch,
    /// Written by the service edge for every received migrator callback.
    Callback,
}

impl StepEventType {
    /// Returns the stable wire label for the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Callback => "callback",
        }
    }

    /// Parses a stable wire label back into an event type.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "dispatch" => Some(Self::Dispatch),
            "callback" => Some(Self::Callback),
            _ => None,
        }
    }
}

/// Append-only telemetry record consumed by the metrics read path.
///
/// # Invariants
/// - Records are append-only; the sequencer never reads them back.
/// - `duration_ms` is present only on terminal dispatch records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEventRecord {
    /// Migration the step belongs to.
    pub migration_id: MigrationId,
    /// Candidate the step belongs to.
    pub candidate_id: CandidateId,
    /// Step name.
    pub step_name: StepName,
    /// Record source.
    pub event_type: StepEventType,
    /// Step status carried by the record.
    pub status: StepStatus,
    /// Dispatch-to-terminal duration in milliseconds, when measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Metadata snapshot carried by the record.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Record timestamp supplied by the host clock.
    pub created_at: Timestamp,
}
