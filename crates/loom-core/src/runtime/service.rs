// crates/loom-core/src/runtime/service.rs
// ============================================================================
// Module: Loom Orchestration Service
// Description: Stateful facade owning the migration and candidate use-cases.
// Purpose: Execute announce, submit, start, cancel, retry, and read operations.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The orchestration service is the single canonical execution path for Loom.
//! All transports call into these methods to preserve the candidate status
//! machine's invariants: status flips to `running` before the engine is asked
//! to start (and rolls back on engine failure), reads join durable state with
//! the live engine view, and telemetry appends never fail a callback.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Candidate;
use crate::core::CandidateId;
use crate::core::CandidateStatus;
use crate::core::Migration;
use crate::core::MigrationAnnouncement;
use crate::core::MigrationId;
use crate::core::RunId;
use crate::core::RunIdError;
use crate::core::RuntimeStatus;
use crate::core::SignalName;
use crate::core::StepDefinition;
use crate::core::StepEventRecord;
use crate::core::StepEventType;
use crate::core::StepName;
use crate::core::StepState;
use crate::core::StepStatusEvent;
use crate::interfaces::Clock;
use crate::interfaces::DryRunError;
use crate::interfaces::DryRunRequest;
use crate::interfaces::DryRunResult;
use crate::interfaces::DryRunner;
use crate::interfaces::EngineError;
use crate::interfaces::ExecutionEngine;
use crate::interfaces::RegistryError;
use crate::interfaces::RegistryStore;
use crate::interfaces::RunInput;
use crate::interfaces::StepEventError;
use crate::interfaces::StepEventStore;
use crate::runtime::metrics;
use crate::runtime::metrics::MetricsOverview;
use crate::runtime::metrics::StepMetricsEntry;
use crate::runtime::metrics::TimelineBucket;
use crate::runtime::sequencer::CANDIDATE_RUN_PROGRAM;
use crate::runtime::store::SharedRegistryStore;
use crate::runtime::store::SharedStepEventStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Orchestration service errors.
///
/// # Invariants
/// - Variants are stable; transports map them onto status codes.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Migration does not exist.
    #[error("migration not found: {0}")]
    MigrationNotFound(String),
    /// Candidate does not exist within the migration.
    #[error("candidate not found: {0}")]
    CandidateNotFound(String),
    /// Engine has no record of the run.
    #[error("run not found: {0}")]
    RunNotFound(String),
    /// Candidate already completed a run.
    #[error("candidate already run: {0}")]
    CandidateAlreadyRun(String),
    /// Operation requires a running candidate.
    #[error("candidate is not running: {0}")]
    CandidateNotRunning(String),
    /// Required inputs are not satisfied by metadata plus provided inputs.
    #[error("missing required inputs: {}", missing.join(", "))]
    MissingRequiredInputs {
        /// Names of the unsatisfied inputs, sorted.
        missing: Vec<String>,
    },
    /// Submitted candidate violates an invariant.
    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),
    /// Run identifier is malformed.
    #[error(transparent)]
    InvalidRunId(#[from] RunIdError),
    /// Registry backend failure.
    #[error(transparent)]
    Registry(RegistryError),
    /// Execution engine failure.
    #[error(transparent)]
    Engine(EngineError),
    /// Dry-run failure.
    #[error(transparent)]
    DryRun(#[from] DryRunError),
    /// Step event store failure.
    #[error(transparent)]
    Events(#[from] StepEventError),
    /// Internal serialization failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MigrationNotFound(id) => Self::MigrationNotFound(id),
            RegistryError::CandidateNotFound(id) => Self::CandidateNotFound(id),
            other => Self::Registry(other),
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::RunNotFound(id) => Self::RunNotFound(id),
            other => Self::Engine(other),
        }
    }
}

// ============================================================================
// SECTION: Read Models
// ============================================================================

/// Step state decorated with the template description for the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStateView {
    /// Underlying derived step state.
    #[serde(flatten)]
    pub state: StepState,
    /// Description from the effective step definition.
    #[serde(default)]
    pub description: String,
}

/// Merged candidate view assembled from durable state and the live engine.
///
/// # Invariants
/// - `runtime_status` is absent when the engine has no record of the run;
///   the view then reflects durable state only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateStepsView {
    /// Candidate the view describes.
    pub candidate_id: CandidateId,
    /// Durable candidate status.
    pub candidate_status: CandidateStatus,
    /// Engine-reported runtime status, when a run is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_status: Option<RuntimeStatus>,
    /// Per-step states in first-dispatch order.
    #[serde(default)]
    pub steps: Vec<StepStateView>,
}

// ============================================================================
// SECTION: Orchestration Service
// ============================================================================

/// Stateful facade exposed to transports.
pub struct OrchestrationService {
    /// Registry store holding migrations and candidates.
    registry: SharedRegistryStore,
    /// Append-only telemetry store.
    events: SharedStepEventStore,
    /// Durable execution engine port.
    engine: Arc<dyn ExecutionEngine>,
    /// Outbound dry-run client.
    dry_runner: Arc<dyn DryRunner>,
    /// Host clock for telemetry timestamps and metrics windows.
    clock: Arc<dyn Clock>,
}

impl OrchestrationService {
    /// Creates a new orchestration service over the provided ports.
    #[must_use]
    pub fn new(
        registry: SharedRegistryStore,
        events: SharedStepEventStore,
        engine: Arc<dyn ExecutionEngine>,
        dry_runner: Arc<dyn DryRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            events,
            engine,
            dry_runner,
            clock,
        }
    }

    /// Upserts a migration from the migrator's self-announcement, preserving
    /// the candidate set of an existing migration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the registry fails.
    pub fn announce(
        &self,
        announcement: MigrationAnnouncement,
    ) -> Result<Migration, ServiceError> {
        let existing = self.registry.get(&announcement.id)?;
        let mut migration = announcement.into_migration();
        if let Some(previous) = existing {
            migration.candidates = previous.candidates;
        }
        self.registry.save(&migration)?;
        Ok(migration)
    }

    /// Lists every registered migration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the registry fails.
    pub fn list(&self) -> Result<Vec<Migration>, ServiceError> {
        Ok(self.registry.list()?)
    }

    /// Returns a migration, or `None` when it is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the registry fails; an absent migration
    /// is not an error.
    pub fn get(&self, id: &MigrationId) -> Result<Option<Migration>, ServiceError> {
        Ok(self.registry.get(id)?)
    }

    /// Replaces the candidate set of a migration, preserving status for
    /// candidates whose id already existed with the same kind.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidCandidate`] when a candidate kind is
    /// empty, and registry errors otherwise.
    pub fn submit_candidates(
        &self,
        migration_id: &MigrationId,
        candidates: Vec<Candidate>,
    ) -> Result<(), ServiceError> {
        for candidate in &candidates {
            if candidate.kind.is_empty() {
                return Err(ServiceError::InvalidCandidate(format!(
                    "candidate {} has an empty kind",
                    candidate.id
                )));
            }
        }
        self.registry.save_candidates(migration_id, candidates)?;
        Ok(())
    }

    /// Returns the candidate list of a migration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the migration is missing or the registry fails.
    pub fn get_candidates(
        &self,
        migration_id: &MigrationId,
    ) -> Result<Vec<Candidate>, ServiceError> {
        Ok(self.registry.get_candidates(migration_id)?)
    }

    /// Starts a candidate run, idempotently returning the in-flight run for a
    /// candidate that is already running.
    ///
    /// Status is flipped to `running` before the engine is asked to start; an
    /// engine failure rolls the status back to `not_started`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::CandidateAlreadyRun`] for completed candidates,
    /// [`ServiceError::MissingRequiredInputs`] when the metadata union does
    /// not satisfy the migration's required inputs, and lookup or backend
    /// errors otherwise.
    pub async fn start(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        inputs: BTreeMap<String, String>,
    ) -> Result<RunId, ServiceError> {
        let migration = self.load_migration(migration_id)?;
        let candidate = find_candidate(&migration, candidate_id)?;
        let run_id = RunId::new(migration_id.clone(), candidate_id.clone())?;

        match candidate.status {
            CandidateStatus::Running => return Ok(run_id),
            CandidateStatus::Completed => {
                return Err(ServiceError::CandidateAlreadyRun(candidate_id.to_string()));
            }
            CandidateStatus::NotStarted | CandidateStatus::Failed | CandidateStatus::Cancelled => {}
        }

        let missing = migration.missing_inputs(&candidate.metadata, &inputs);
        if !missing.is_empty() {
            return Err(ServiceError::MissingRequiredInputs {
                missing,
            });
        }

        if !inputs.is_empty() {
            self.registry.update_candidate_metadata(migration_id, candidate_id, &inputs)?;
        }
        self.registry.set_candidate_status(migration_id, candidate_id, CandidateStatus::Running)?;

        let input = RunInput {
            migration: migration.clone(),
            candidate: candidate.clone(),
            initial_inputs: inputs,
        };
        match self.engine.start_run(CANDIDATE_RUN_PROGRAM, &run_id, input).await {
            Ok(run_id) => Ok(run_id),
            Err(err) => {
                // Do not leave a candidate claiming `running` when no run exists.
                let _ = self.registry.set_candidate_status(
                    migration_id,
                    candidate_id,
                    CandidateStatus::NotStarted,
                );
                Err(err.into())
            }
        }
    }

    /// Cancels a running candidate and resets it to `not_started` so it may
    /// be started again.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::CandidateNotRunning`] when the candidate has
    /// no active run. An engine that no longer knows the run is reconciled,
    /// not an error.
    pub async fn cancel(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
    ) -> Result<(), ServiceError> {
        let migration = self.load_migration(migration_id)?;
        let candidate = find_candidate(&migration, candidate_id)?;
        if candidate.status != CandidateStatus::Running {
            return Err(ServiceError::CandidateNotRunning(candidate_id.to_string()));
        }
        let run_id = RunId::new(migration_id.clone(), candidate_id.clone())?;
        match self.engine.cancel_run(&run_id).await {
            Ok(()) | Err(EngineError::RunNotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        self.registry.set_candidate_status(
            migration_id,
            candidate_id,
            CandidateStatus::NotStarted,
        )?;
        Ok(())
    }

    /// Raises the retry signal for a failed step of a running candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::CandidateNotRunning`] when the candidate has
    /// no active run, and engine errors otherwise.
    pub async fn retry_step(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        step: &StepName,
    ) -> Result<(), ServiceError> {
        let migration = self.load_migration(migration_id)?;
        let candidate = find_candidate(&migration, candidate_id)?;
        if candidate.status != CandidateStatus::Running {
            return Err(ServiceError::CandidateNotRunning(candidate_id.to_string()));
        }
        let run_id = RunId::new(migration_id.clone(), candidate_id.clone())?;
        let signal = SignalName::retry_step(step, candidate_id);
        self.engine.raise_event(&run_id, &signal, None).await?;
        Ok(())
    }

    /// Merges metadata into a candidate and forwards the update to its run
    /// when one is active.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the lookup or registry write fails.
    pub async fn update_inputs(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        inputs: BTreeMap<String, String>,
    ) -> Result<(), ServiceError> {
        let migration = self.load_migration(migration_id)?;
        let candidate = find_candidate(&migration, candidate_id)?;
        self.registry.update_candidate_metadata(migration_id, candidate_id, &inputs)?;
        if candidate.status == CandidateStatus::Running {
            let run_id = RunId::new(migration_id.clone(), candidate_id.clone())?;
            let signal = SignalName::update_inputs(candidate_id);
            let payload = serde_json::to_value(&inputs)
                .map_err(|err| ServiceError::Internal(err.to_string()))?;
            match self.engine.raise_event(&run_id, &signal, Some(payload)).await {
                Ok(()) | Err(EngineError::RunNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Delivers a migrator callback to the suspended run and appends a
    /// best-effort telemetry record.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::RunNotFound`] when the engine has no record of
    /// the run. A telemetry append failure never fails the call.
    pub async fn handle_event(
        &self,
        run_id: &RunId,
        event: StepStatusEvent,
    ) -> Result<(), ServiceError> {
        let signal = SignalName::step_completed(&event.step_name, &event.candidate_id);
        let payload = serde_json::to_value(&event)
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        self.engine.raise_event(run_id, &signal, Some(payload)).await?;

        let record = StepEventRecord {
            migration_id: run_id.migration_id().clone(),
            candidate_id: event.candidate_id,
            step_name: event.step_name,
            event_type: StepEventType::Callback,
            status: event.status,
            duration_ms: None,
            metadata: event.metadata,
            created_at: self.clock.now(),
        };
        let _ = self.events.append(&record);
        Ok(())
    }

    /// Returns the merged step view for a candidate: the engine's run state
    /// joined with the step template, or a synthetic durable-only view when
    /// the engine has no record of the run.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the lookup fails or the engine fails
    /// with anything other than an unknown run.
    pub async fn candidate_steps(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
    ) -> Result<CandidateStepsView, ServiceError> {
        let migration = self.load_migration(migration_id)?;
        let candidate = find_candidate(&migration, candidate_id)?;
        let run_id = RunId::new(migration_id.clone(), candidate_id.clone())?;
        let steps = migration.steps_for(candidate);
        match self.engine.status(&run_id).await {
            Ok(report) => Ok(CandidateStepsView {
                candidate_id: candidate_id.clone(),
                candidate_status: candidate.status,
                runtime_status: Some(report.runtime_status),
                steps: report
                    .steps
                    .into_iter()
                    .map(|state| decorate_step(steps, state))
                    .collect(),
            }),
            Err(EngineError::RunNotFound(_)) => Ok(CandidateStepsView {
                candidate_id: candidate_id.clone(),
                candidate_status: candidate.status,
                runtime_status: None,
                steps: Vec::new(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Posts a dry-run for a caller-provided candidate against the
    /// migration's effective step list.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the migration is missing or the dry-run
    /// client fails.
    pub async fn dry_run(
        &self,
        migration_id: &MigrationId,
        candidate: Candidate,
    ) -> Result<DryRunResult, ServiceError> {
        let migration = self.load_migration(migration_id)?;
        let steps = migration.steps_for(&candidate).to_vec();
        let request = DryRunRequest {
            migration_id: migration_id.clone(),
            candidate,
            steps,
        };
        Ok(self.dry_runner.dry_run(&migration.migrator_url, &request).await?)
    }

    /// Aggregates the telemetry overview, optionally scoped to a migration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the event store scan fails.
    pub fn metrics_overview(
        &self,
        migration_id: Option<&MigrationId>,
    ) -> Result<MetricsOverview, ServiceError> {
        let records = self.events.list(migration_id)?;
        Ok(metrics::overview(&records))
    }

    /// Aggregates per-step success and duration metrics.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the event store scan fails.
    pub fn metrics_steps(
        &self,
        migration_id: Option<&MigrationId>,
    ) -> Result<Vec<StepMetricsEntry>, ServiceError> {
        let records = self.events.list(migration_id)?;
        Ok(metrics::per_step(&records))
    }

    /// Buckets terminal step outcomes per UTC day over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the event store scan fails.
    pub fn metrics_timeline(
        &self,
        migration_id: Option<&MigrationId>,
        days: u16,
    ) -> Result<Vec<TimelineBucket>, ServiceError> {
        let records = self.events.list(migration_id)?;
        Ok(metrics::timeline(&records, self.clock.now(), days))
    }

    /// Returns the most recent failed step records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the event store scan fails.
    pub fn metrics_failures(
        &self,
        migration_id: Option<&MigrationId>,
        limit: usize,
    ) -> Result<Vec<StepEventRecord>, ServiceError> {
        let records = self.events.list(migration_id)?;
        Ok(metrics::recent_failures(records, limit))
    }

    /// Reports readiness of the backing stores.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when a store is unavailable.
    pub fn readiness(&self) -> Result<(), ServiceError> {
        self.registry.readiness().map_err(ServiceError::from)?;
        self.events.readiness()?;
        Ok(())
    }

    /// Loads a migration or fails with a typed not-found error.
    fn load_migration(&self, migration_id: &MigrationId) -> Result<Migration, ServiceError> {
        self.registry
            .get(migration_id)?
            .ok_or_else(|| ServiceError::MigrationNotFound(migration_id.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Finds a candidate within a loaded migration.
fn find_candidate<'a>(
    migration: &'a Migration,
    candidate_id: &CandidateId,
) -> Result<&'a Candidate, ServiceError> {
    migration
        .candidates
        .iter()
        .find(|candidate| candidate.id == *candidate_id)
        .ok_or_else(|| ServiceError::CandidateNotFound(candidate_id.to_string()))
}

/// Decorates a step state with the description from the effective step list.
fn decorate_step(steps: &[StepDefinition], state: StepState) -> StepStateView {
    let description = steps
        .iter()
        .find(|step| step.name == state.step_name)
        .map(|step| step.description.clone())
        .unwrap_or_default();
    StepStateView {
        state,
        description,
    }
}
