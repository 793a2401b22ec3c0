// crates/loom-core/src/interfaces/mod.rs
// ============================================================================
// Module: Loom Interfaces
// Description: Backend-agnostic interfaces for storage, execution, and dispatch.
// Purpose: Define the contract surfaces used by the Loom orchestration runtime.
// Dependencies: crate::core, async-trait, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Loom integrates with external systems without
//! embedding backend-specific details. The orchestration service and the run
//! sequencer depend only on these narrow capability sets; tests substitute
//! in-memory implementations. Storage ports are synchronous (implementations
//! bound their own I/O); the execution engine and migrator ports are
//! asynchronous because dispatch and signal waits cross the runtime boundary.
//!
//! Security posture: interface implementations consume untrusted inputs and
//! must fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::Candidate;
use crate::core::CandidateId;
use crate::core::CandidateStatus;
use crate::core::Migration;
use crate::core::MigrationId;
use crate::core::MigratorApp;
use crate::core::RunId;
use crate::core::RunStatusReport;
use crate::core::Signal;
use crate::core::SignalName;
use crate::core::StepDefinition;
use crate::core::StepEventRecord;
use crate::core::StepName;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Registry Store
// ============================================================================

/// Registry store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Migration does not exist in the registry.
    #[error("migration not found: {0}")]
    MigrationNotFound(String),
    /// Candidate does not exist within the migration.
    #[error("candidate not found: {0}")]
    CandidateNotFound(String),
    /// Registry I/O error.
    #[error("registry store io error: {0}")]
    Io(String),
    /// Registry reported an error.
    #[error("registry store error: {0}")]
    Store(String),
}

/// Durable mapping from migration id to migration document and candidates.
///
/// Guarantees: each single-candidate mutation is atomic relative to
/// concurrent reads of that candidate (reads see either the pre- or
/// post-state, never a torn write). The store need not be linearizable
/// across different candidates.
pub trait RegistryStore: Send + Sync {
    /// Saves (upserts) a migration document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when saving fails.
    fn save(&self, migration: &Migration) -> Result<(), RegistryError>;

    /// Loads a migration by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when loading fails; an absent migration is
    /// `Ok(None)`, not an error.
    fn get(&self, id: &MigrationId) -> Result<Option<Migration>, RegistryError>;

    /// Lists every registered migration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when listing fails.
    fn list(&self) -> Result<Vec<Migration>, RegistryError>;

    /// Sets the status of a single candidate.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the migration or candidate is missing.
    fn set_candidate_status(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        status: CandidateStatus,
    ) -> Result<(), RegistryError>;

    /// Replaces the candidate set wholesale, preserving `status` for
    /// candidates whose id already existed with the same `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MigrationNotFound`] when the migration is missing.
    fn save_candidates(
        &self,
        migration_id: &MigrationId,
        candidates: Vec<Candidate>,
    ) -> Result<(), RegistryError>;

    /// Returns the candidate list for a migration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MigrationNotFound`] when the migration is missing.
    fn get_candidates(&self, migration_id: &MigrationId) -> Result<Vec<Candidate>, RegistryError>;

    /// Merges entries into a candidate's metadata map.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the migration or candidate is missing.
    fn update_candidate_metadata(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), RegistryError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Step Event Store
// ============================================================================

/// Step event store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StepEventError {
    /// Event store I/O error.
    #[error("step event store io error: {0}")]
    Io(String),
    /// Event store reported an error.
    #[error("step event store error: {0}")]
    Store(String),
}

/// Append-only telemetry store consumed by the metrics read path.
pub trait StepEventStore: Send + Sync {
    /// Appends a telemetry record.
    ///
    /// # Errors
    ///
    /// Returns [`StepEventError`] when the append fails.
    fn append(&self, record: &StepEventRecord) -> Result<(), StepEventError>;

    /// Returns records in append order, optionally filtered by migration.
    ///
    /// # Errors
    ///
    /// Returns [`StepEventError`] when the scan fails.
    fn list(&self, migration_id: Option<&MigrationId>)
    -> Result<Vec<StepEventRecord>, StepEventError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StepEventError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StepEventError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Execution Engine
// ============================================================================

/// Execution engine errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Transient engine failures never mutate candidate status.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine has no record of the run.
    #[error("run not found: {0}")]
    RunNotFound(String),
    /// No program is registered under the requested run name.
    #[error("run program not registered: {0}")]
    ProgramNotFound(String),
    /// Engine reported an error.
    #[error("execution engine error: {0}")]
    Engine(String),
}

/// Input payload handed to a run program at start.
///
/// # Invariants
/// - `candidate` is a snapshot; the program merges `initial_inputs` into its
///   metadata before walking the step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    /// Migration document at start time.
    pub migration: Migration,
    /// Candidate snapshot at start time.
    pub candidate: Candidate,
    /// Operator-supplied inputs merged into the candidate metadata.
    #[serde(default)]
    pub initial_inputs: BTreeMap<String, String>,
}

/// Durable executor over which per-candidate runs are started, signalled,
/// cancelled, and queried. Treated as a black box with at-most-once delivery
/// of signals by name.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Starts a run. Idempotent on `run_id`: if a run with the same id
    /// already exists, returns its id without starting a new one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the program is unknown or the engine fails.
    async fn start_run(
        &self,
        run_name: &str,
        run_id: &RunId,
        input: RunInput,
    ) -> Result<RunId, EngineError>;

    /// Returns the runtime status and derived step view for a run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunNotFound`] when the engine has no record.
    async fn status(&self, run_id: &RunId) -> Result<RunStatusReport, EngineError>;

    /// Delivers a named signal to the run. Delivery is at-most-once per
    /// payload instance; signals no waiter is listening for are buffered
    /// until a matching wait appears.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunNotFound`] when the engine has no record.
    async fn raise_event(
        &self,
        run_id: &RunId,
        signal: &SignalName,
        payload: Option<Value>,
    ) -> Result<(), EngineError>;

    /// Requests cooperative cancellation; the run observes it at its next
    /// suspension point.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RunNotFound`] when the engine has no record.
    async fn cancel_run(&self, run_id: &RunId) -> Result<(), EngineError>;
}

// ============================================================================
// SECTION: Run Programs
// ============================================================================

/// Wait errors observed by a run program at a suspension point.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    /// Cancellation was requested; the program must stop at this point.
    #[error("run cancelled")]
    Cancelled,
}

/// Terminal outcome of a run program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step completed successfully.
    Completed,
    /// Cancellation was observed at a suspension point.
    Cancelled,
}

/// Run program failure.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RunError {
    /// Registry write failed inside the run.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Program-internal failure.
    #[error("run program failure: {0}")]
    Internal(String),
}

/// Engine-provided handle a run program suspends and publishes through.
#[async_trait]
pub trait RunContext: Send + Sync {
    /// Returns the run identity.
    fn run_id(&self) -> &RunId;

    /// Suspends until one of the named signals arrives, with listed-order
    /// priority among already-buffered signals.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Cancelled`] when cancellation has been requested.
    async fn wait_any(&self, signals: &[SignalName]) -> Result<Signal, WaitError>;

    /// Publishes a step state into the run's derived view, replacing any
    /// existing entry with the same step name.
    fn record_step(&self, state: crate::core::StepState);
}

/// Program the execution engine runs for each run id.
#[async_trait]
pub trait RunProgram: Send + Sync {
    /// Stable program name used by [`ExecutionEngine::start_run`].
    fn name(&self) -> &str;

    /// Executes the program to completion or cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] on unrecoverable failure; the engine records the
    /// run as failed.
    async fn execute(
        &self,
        ctx: std::sync::Arc<dyn RunContext>,
        input: RunInput,
    ) -> Result<RunOutcome, RunError>;
}

// ============================================================================
// SECTION: Migrator Notifier
// ============================================================================

/// Migrator dispatch errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - A failed dispatch is terminal for the attempt; the sequencer
///   re-dispatches on retry.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Dispatch was rejected or the transport failed.
    #[error("step dispatch failed: {0}")]
    DispatchFailed(String),
}

/// Step dispatch request posted to `{migratorUrl}/dispatch-step`.
///
/// # Invariants
/// - `callback_id` and `event_name` are used verbatim by the worker when it
///   posts the completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStepRequest {
    /// Migration the step belongs to.
    pub migration_id: MigrationId,
    /// Migrator application that handles the step.
    pub migrator_app: MigratorApp,
    /// Base URL of the migrator worker.
    pub migrator_url: String,
    /// Step to execute.
    pub step_name: StepName,
    /// Full candidate snapshot, including metadata.
    pub candidate: Candidate,
    /// Step configuration from the definition.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Opaque step type token from the definition.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
    /// Run identity the worker calls back with.
    pub callback_id: RunId,
    /// Completion signal name the run is suspended on.
    pub event_name: SignalName,
}

/// Outbound dispatch client for the external migrator.
#[async_trait]
pub trait MigratorNotifier: Send + Sync {
    /// Posts a step dispatch request to the migrator.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::DispatchFailed`] on any non-2xx response or
    /// transport failure.
    async fn dispatch(&self, request: &DispatchStepRequest) -> Result<(), NotifyError>;
}

// ============================================================================
// SECTION: Dry Runner
// ============================================================================

/// Dry-run errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum DryRunError {
    /// Dry-run was rejected or the transport failed.
    #[error("dry-run failed: {0}")]
    Failed(String),
}

/// Dry-run request posted to `{migratorUrl}/dry-run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunRequest {
    /// Migration the candidate belongs to.
    pub migration_id: MigrationId,
    /// Candidate to evaluate, as provided by the caller.
    pub candidate: Candidate,
    /// Effective step list (candidate override else template).
    pub steps: Vec<StepDefinition>,
}

/// File diff status reported by a dry-run.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// File would be created.
    New,
    /// File would be modified.
    Modified,
    /// File would be deleted.
    Deleted,
}

/// Single file diff produced by a dry-run step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// File path the diff applies to.
    pub path: String,
    /// File content before the change, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// File content after the change, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Diff status.
    pub status: DiffStatus,
}

/// Per-step dry-run outcome: skipped, or a list of file diffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunStepResult {
    /// Step the result refers to.
    pub step_name: StepName,
    /// True when the migrator skipped the step for this candidate.
    #[serde(default)]
    pub skipped: bool,
    /// File diffs the step would produce.
    #[serde(default)]
    pub diffs: Vec<FileDiff>,
}

/// Dry-run result returned by the migrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunResult {
    /// Per-step results in step order.
    #[serde(default)]
    pub steps: Vec<DryRunStepResult>,
}

/// Outbound dry-run client for the external migrator.
#[async_trait]
pub trait DryRunner: Send + Sync {
    /// Posts a dry-run request to the migrator at `migrator_url` and decodes
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns [`DryRunError`] on any non-2xx response, transport failure,
    /// or undecodable body.
    async fn dry_run(
        &self,
        migrator_url: &str,
        request: &DryRunRequest,
    ) -> Result<DryRunResult, DryRunError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Host clock supplying timestamps for telemetry records.
///
/// The core never reads wall-clock time directly; hosts plug in a real
/// clock at the edge and tests use a logical clock.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}
