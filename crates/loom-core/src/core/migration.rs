// crates/loom-core/src/core/migration.rs
// ============================================================================
// Module: Loom Registry Entities
// Description: Migration templates, step definitions, and candidates.
// Purpose: Provide the durable documents owned by the registry store.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! A migration is a named, ordered template of steps plus the set of
//! candidates it applies to. Candidates may carry their own step list
//! (computed at discovery time) which overrides the template; the run
//! sequencer always walks the effective list returned by
//! [`Migration::steps_for`]. All wire fields are camelCase because the
//! migrator protocol and console depend on the JSON shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CandidateId;
use crate::core::identifiers::MigrationId;
use crate::core::identifiers::MigratorApp;
use crate::core::identifiers::StepName;

// ============================================================================
// SECTION: Step Template
// ============================================================================

/// One unit of work executed by the external migrator.
///
/// # Invariants
/// - `name` is unique within the migration's step list.
/// - `step_type` and `config` are opaque to the core and passed through to
///   the migrator on dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    /// Step name, unique within the migration.
    pub name: StepName,
    /// Human-readable step description.
    #[serde(default)]
    pub description: String,
    /// Migrator application that handles this step.
    pub migrator_app: MigratorApp,
    /// Optional opaque step type token passed through to the migrator.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
    /// Step configuration passed through to the migrator.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Advisory list of files the step touches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

/// Required input declared by a migration.
///
/// # Invariants
/// - `name` keys into candidate metadata; a candidate may not start until
///   every required input is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDefinition {
    /// Metadata key the input populates.
    pub name: String,
    /// Human-readable label shown to operators.
    #[serde(default)]
    pub label: String,
}

// ============================================================================
// SECTION: Candidates
// ============================================================================

/// Candidate lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Initial status is `not_started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Candidate has never run, or was reset by cancellation.
    #[default]
    NotStarted,
    /// Candidate has an active run.
    Running,
    /// Candidate completed every step.
    Completed,
    /// Candidate's run failed terminally.
    Failed,
    /// Candidate's run was cancelled by the engine.
    Cancelled,
}

impl CandidateStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a stable wire label back into a status.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "not_started" => Some(Self::NotStarted),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Advisory grouping of file references carried by a candidate.
///
/// # Invariants
/// - Purely informational; never interpreted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFileGroup {
    /// Group label.
    pub name: String,
    /// File references in the group.
    #[serde(default)]
    pub files: Vec<String>,
}

/// One migration target; the unit a run is scoped to.
///
/// # Invariants
/// - `kind` is never empty after submission.
/// - `steps`, when present, overrides the migration-level template and is
///   what the run sequencer walks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Candidate identifier, unique within its migration.
    pub id: CandidateId,
    /// Candidate kind (repository, application, ...).
    pub kind: String,
    /// Metadata map carrying required inputs and worker context.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Advisory file groupings for the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<CandidateFileGroup>>,
    /// Per-candidate step list overriding the migration template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepDefinition>>,
    /// Candidate lifecycle status.
    #[serde(default)]
    pub status: CandidateStatus,
}

// ============================================================================
// SECTION: Migration
// ============================================================================

/// Named, ordered template of steps with its candidate set.
///
/// # Invariants
/// - Step indexes in `[0, N)` are significant; runs execute steps in order.
/// - A candidate lives inside exactly one migration.
/// - Created by announcement; never deleted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    /// Migration identifier, unique across the process.
    pub id: MigrationId,
    /// Human-readable migration name.
    pub name: String,
    /// Human-readable migration description.
    #[serde(default)]
    pub description: String,
    /// Ordered step template.
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
    /// Inputs that must be populated before a candidate may start.
    #[serde(default)]
    pub required_inputs: Vec<InputDefinition>,
    /// Base URL of the migrator worker for this migration.
    pub migrator_url: String,
    /// Ordered candidate set keyed by id within the migration.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl Migration {
    /// Returns the effective step list for a candidate, preferring the
    /// candidate's own list over the migration template.
    #[must_use]
    pub fn steps_for<'a>(&'a self, candidate: &'a Candidate) -> &'a [StepDefinition] {
        candidate.steps.as_deref().unwrap_or(&self.steps)
    }

    /// Returns the template description for a step name, if any.
    #[must_use]
    pub fn step_description(&self, name: &StepName) -> Option<&str> {
        self.steps
            .iter()
            .find(|step| step.name == *name)
            .map(|step| step.description.as_str())
    }

    /// Returns the required input names not satisfied by the union of the
    /// candidate metadata and the extra inputs, sorted for stable reporting.
    #[must_use]
    pub fn missing_inputs(
        &self,
        metadata: &BTreeMap<String, String>,
        extra: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let missing: BTreeSet<&str> = self
            .required_inputs
            .iter()
            .map(|input| input.name.as_str())
            .filter(|name| !metadata.contains_key(*name) && !extra.contains_key(*name))
            .collect();
        missing.into_iter().map(str::to_string).collect()
    }
}

/// Carries the status of matching candidates over a wholesale replace.
///
/// A candidate in `incoming` inherits the status of an `existing` candidate
/// with the same id and the same kind; everything else about the incoming
/// document (metadata included) is taken as the fresh source of truth.
pub fn preserve_candidate_statuses(existing: &[Candidate], incoming: &mut [Candidate]) {
    for candidate in incoming {
        if let Some(previous) = existing
            .iter()
            .find(|prior| prior.id == candidate.id && prior.kind == candidate.kind)
        {
            candidate.status = previous.status;
        }
    }
}

// ============================================================================
// SECTION: Announcement
// ============================================================================

/// Migrator self-announcement payload used to upsert a migration.
///
/// # Invariants
/// - Carries the template only; candidate sets are submitted separately and
///   preserved across re-announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationAnnouncement {
    /// Migration identifier.
    pub id: MigrationId,
    /// Human-readable migration name.
    pub name: String,
    /// Human-readable migration description.
    #[serde(default)]
    pub description: String,
    /// Ordered step template.
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
    /// Inputs that must be populated before a candidate may start.
    #[serde(default)]
    pub required_inputs: Vec<InputDefinition>,
    /// Base URL of the migrator worker.
    pub migrator_url: String,
}

impl MigrationAnnouncement {
    /// Builds a fresh migration document with an empty candidate set.
    #[must_use]
    pub fn into_migration(self) -> Migration {
        Migration {
            id: self.id,
            name: self.name,
            description: self.description,
            steps: self.steps,
            required_inputs: self.required_inputs,
            migrator_url: self.migrator_url,
            candidates: Vec::new(),
        }
    }
}
