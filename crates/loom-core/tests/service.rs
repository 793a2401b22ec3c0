// crates/loom-core/tests/service.rs
// ============================================================================
// Module: Orchestration Service Tests
// Description: Tests for announce, submit, start, cancel, retry, and reads.
// ============================================================================
//! ## Overview
//! Exercises the orchestration service against in-memory stores and recording
//! engine/dry-runner fixtures, validating the candidate status machine and
//! the error contract.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use loom_core::Candidate;
use loom_core::CandidateId;
use loom_core::CandidateStatus;
use loom_core::Clock;
use loom_core::DryRunError;
use loom_core::DryRunRequest;
use loom_core::DryRunResult;
use loom_core::DryRunner;
use loom_core::EngineError;
use loom_core::ExecutionEngine;
use loom_core::InMemoryRegistryStore;
use loom_core::InMemoryStepEventStore;
use loom_core::InputDefinition;
use loom_core::LogicalClock;
use loom_core::Migration;
use loom_core::MigrationAnnouncement;
use loom_core::MigrationId;
use loom_core::MigratorApp;
use loom_core::OrchestrationService;
use loom_core::RegistryStore;
use loom_core::RunId;
use loom_core::RunInput;
use loom_core::RunStatusReport;
use loom_core::RuntimeStatus;
use loom_core::ServiceError;
use loom_core::SharedRegistryStore;
use loom_core::SharedStepEventStore;
use loom_core::SignalName;
use loom_core::StepDefinition;
use loom_core::StepEventError;
use loom_core::StepEventRecord;
use loom_core::StepEventStore;
use loom_core::StepEventType;
use loom_core::StepName;
use loom_core::StepState;
use loom_core::StepStatus;
use loom_core::StepStatusEvent;
use serde_json::Value;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Execution engine fixture recording every port call.
#[derive(Default)]
struct RecordingEngine {
    /// Recorded `start_run` calls.
    started: Mutex<Vec<(String, RunId, RunInput)>>,
    /// Recorded `raise_event` calls.
    raised: Mutex<Vec<(RunId, SignalName, Option<Value>)>>,
    /// Recorded `cancel_run` calls.
    cancelled: Mutex<Vec<RunId>>,
    /// Makes `start_run` fail with an engine error.
    fail_start: AtomicBool,
    /// Makes `cancel_run` report an unknown run.
    cancel_not_found: AtomicBool,
    /// Status report returned by `status`, or run-not-found when absent.
    status: Mutex<Option<RunStatusReport>>,
}

impl RecordingEngine {
    fn started(&self) -> Vec<(String, RunId, RunInput)> {
        self.started.lock().unwrap().clone()
    }

    fn raised(&self) -> Vec<(RunId, SignalName, Option<Value>)> {
        self.raised.lock().unwrap().clone()
    }

    fn set_status(&self, report: RunStatusReport) {
        *self.status.lock().unwrap() = Some(report);
    }
}

#[async_trait]
impl ExecutionEngine for RecordingEngine {
    async fn start_run(
        &self,
        run_name: &str,
        run_id: &RunId,
        input: RunInput,
    ) -> Result<RunId, EngineError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(EngineError::Engine("engine unavailable".to_string()));
        }
        self.started.lock().unwrap().push((run_name.to_string(), run_id.clone(), input));
        Ok(run_id.clone())
    }

    async fn status(&self, run_id: &RunId) -> Result<RunStatusReport, EngineError> {
        self.status
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }

    async fn raise_event(
        &self,
        run_id: &RunId,
        signal: &SignalName,
        payload: Option<Value>,
    ) -> Result<(), EngineError> {
        self.raised.lock().unwrap().push((run_id.clone(), signal.clone(), payload));
        Ok(())
    }

    async fn cancel_run(&self, run_id: &RunId) -> Result<(), EngineError> {
        if self.cancel_not_found.load(Ordering::SeqCst) {
            return Err(EngineError::RunNotFound(run_id.to_string()));
        }
        self.cancelled.lock().unwrap().push(run_id.clone());
        Ok(())
    }
}

/// Dry-runner fixture recording the last request.
#[derive(Default)]
struct RecordingDryRunner {
    /// Last `(migrator_url, request)` pair.
    last: Mutex<Option<(String, DryRunRequest)>>,
}

#[async_trait]
impl DryRunner for RecordingDryRunner {
    async fn dry_run(
        &self,
        migrator_url: &str,
        request: &DryRunRequest,
    ) -> Result<DryRunResult, DryRunError> {
        *self.last.lock().unwrap() = Some((migrator_url.to_string(), request.clone()));
        Ok(DryRunResult {
            steps: Vec::new(),
        })
    }
}

/// Step event store that rejects every append.
struct FailingEventStore;

impl StepEventStore for FailingEventStore {
    fn append(&self, _record: &StepEventRecord) -> Result<(), StepEventError> {
        Err(StepEventError::Store("event store offline".to_string()))
    }

    fn list(
        &self,
        _migration_id: Option<&MigrationId>,
    ) -> Result<Vec<StepEventRecord>, StepEventError> {
        Ok(Vec::new())
    }
}

fn step(name: &str) -> StepDefinition {
    StepDefinition {
        name: StepName::new(name),
        description: format!("step {name}"),
        migrator_app: MigratorApp::new("worker"),
        step_type: None,
        config: BTreeMap::new(),
        files: None,
    }
}

fn candidate(id: &str) -> Candidate {
    Candidate {
        id: CandidateId::new(id),
        kind: "repository".to_string(),
        metadata: BTreeMap::new(),
        files: None,
        steps: None,
        status: CandidateStatus::NotStarted,
    }
}

fn announcement() -> MigrationAnnouncement {
    MigrationAnnouncement {
        id: MigrationId::new("mig1"),
        name: "Migration One".to_string(),
        description: "first migration".to_string(),
        steps: vec![step("A"), step("B")],
        required_inputs: Vec::new(),
        migrator_url: "https://migrator.example".to_string(),
    }
}

/// Service harness over recording fixtures.
struct Harness {
    service: OrchestrationService,
    registry: SharedRegistryStore,
    events: SharedStepEventStore,
    engine: Arc<RecordingEngine>,
    dry_runner: Arc<RecordingDryRunner>,
}

impl Harness {
    fn new() -> Self {
        Self::with_events(SharedStepEventStore::from_store(InMemoryStepEventStore::new()))
    }

    fn with_events(events: SharedStepEventStore) -> Self {
        let registry = SharedRegistryStore::from_store(InMemoryRegistryStore::new());
        let engine = Arc::new(RecordingEngine::default());
        let dry_runner = Arc::new(RecordingDryRunner::default());
        let clock: Arc<dyn Clock> = Arc::new(LogicalClock::new());
        let service = OrchestrationService::new(
            registry.clone(),
            events.clone(),
            Arc::clone(&engine) as Arc<dyn ExecutionEngine>,
            Arc::clone(&dry_runner) as Arc<dyn DryRunner>,
            clock,
        );
        Self {
            service,
            registry,
            events,
            engine,
            dry_runner,
        }
    }

    fn seed(&self, candidates: Vec<Candidate>) -> Migration {
        let migration = self.service.announce(announcement()).unwrap();
        self.service.submit_candidates(&migration.id, candidates).unwrap();
        migration
    }

    fn candidate_status(&self, id: &str) -> CandidateStatus {
        let candidates = self.registry.get_candidates(&MigrationId::new("mig1")).unwrap();
        candidates
            .iter()
            .find(|candidate| candidate.id.as_str() == id)
            .map(|candidate| candidate.status)
            .unwrap()
    }
}

fn mig_id() -> MigrationId {
    MigrationId::new("mig1")
}

fn cand_id() -> CandidateId {
    CandidateId::new("cand1")
}

// ============================================================================
// SECTION: Registry Operations
// ============================================================================

#[test]
fn announce_upserts_and_preserves_existing_candidates() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let mut second = announcement();
    second.description = "revised".to_string();
    let stored = harness.service.announce(second).unwrap();

    assert_eq!(stored.description, "revised");
    assert_eq!(stored.candidates.len(), 1);
    assert_eq!(stored.candidates[0].id.as_str(), "cand1");
}

#[test]
fn submit_preserves_status_for_matching_id_and_kind() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness
        .registry
        .set_candidate_status(&mig_id(), &cand_id(), CandidateStatus::Running)
        .unwrap();

    let mut resubmitted = candidate("cand1");
    resubmitted.metadata.insert("team".to_string(), "infra".to_string());
    harness
        .service
        .submit_candidates(&mig_id(), vec![resubmitted, candidate("cand2")])
        .unwrap();

    let candidates = harness.service.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].status, CandidateStatus::Running);
    assert_eq!(candidates[0].metadata.get("team").map(String::as_str), Some("infra"));
    assert_eq!(candidates[1].status, CandidateStatus::NotStarted);
}

#[test]
fn submit_does_not_preserve_status_across_kind_changes() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness
        .registry
        .set_candidate_status(&mig_id(), &cand_id(), CandidateStatus::Completed)
        .unwrap();

    let mut changed = candidate("cand1");
    changed.kind = "application".to_string();
    harness.service.submit_candidates(&mig_id(), vec![changed]).unwrap();

    assert_eq!(harness.candidate_status("cand1"), CandidateStatus::NotStarted);
}

#[test]
fn submit_rejects_empty_candidate_kind() {
    let harness = Harness::new();
    harness.seed(Vec::new());

    let mut bad = candidate("cand1");
    bad.kind = String::new();
    let err = harness.service.submit_candidates(&mig_id(), vec![bad]).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCandidate(_)));
}

#[test]
fn submit_to_unknown_migration_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .service
        .submit_candidates(&MigrationId::new("ghost"), vec![candidate("cand1")])
        .unwrap_err();
    assert!(matches!(err, ServiceError::MigrationNotFound(_)));
}

// ============================================================================
// SECTION: Start
// ============================================================================

#[tokio::test]
async fn start_flips_status_and_hands_the_run_to_the_engine() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let run_id = harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap();
    assert_eq!(run_id.to_string(), "mig1__cand1");
    assert_eq!(harness.candidate_status("cand1"), CandidateStatus::Running);

    let started = harness.engine.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].0, "CandidateRun");
    assert_eq!(started[0].1.to_string(), "mig1__cand1");
}

#[tokio::test]
async fn start_merges_inputs_into_metadata_before_the_engine_call() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let inputs: BTreeMap<String, String> =
        [("env".to_string(), "prod".to_string())].into_iter().collect();
    harness.service.start(&mig_id(), &cand_id(), inputs.clone()).await.unwrap();

    let candidates = harness.service.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates[0].metadata.get("env").map(String::as_str), Some("prod"));
    assert_eq!(harness.engine.started()[0].2.initial_inputs, inputs);
}

#[tokio::test]
async fn start_is_idempotent_for_a_running_candidate() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap();

    let run_id = harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap();
    assert_eq!(run_id.to_string(), "mig1__cand1");
    // The engine saw exactly one start.
    assert_eq!(harness.engine.started().len(), 1);
}

#[tokio::test]
async fn start_rejects_a_completed_candidate() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness
        .registry
        .set_candidate_status(&mig_id(), &cand_id(), CandidateStatus::Completed)
        .unwrap();

    let err = harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap_err();
    assert!(matches!(err, ServiceError::CandidateAlreadyRun(_)));
    assert!(harness.engine.started().is_empty());
}

#[tokio::test]
async fn start_reports_missing_required_inputs_without_calling_the_engine() {
    let harness = Harness::new();
    let mut with_inputs = announcement();
    with_inputs.required_inputs = vec![
        InputDefinition {
            name: "env".to_string(),
            label: "Environment".to_string(),
        },
        InputDefinition {
            name: "owner".to_string(),
            label: "Owner".to_string(),
        },
    ];
    harness.service.announce(with_inputs).unwrap();
    harness.service.submit_candidates(&mig_id(), vec![candidate("cand1")]).unwrap();

    let err = harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap_err();
    match err {
        ServiceError::MissingRequiredInputs {
            missing,
        } => assert_eq!(missing, vec!["env".to_string(), "owner".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.engine.started().is_empty());
    assert_eq!(harness.candidate_status("cand1"), CandidateStatus::NotStarted);
}

#[tokio::test]
async fn start_rolls_back_status_when_the_engine_fails() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness.engine.fail_start.store(true, Ordering::SeqCst);

    let err = harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Engine(_)));
    assert_eq!(harness.candidate_status("cand1"), CandidateStatus::NotStarted);
}

#[tokio::test]
async fn start_on_unknown_candidate_is_not_found() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let err = harness
        .service
        .start(&mig_id(), &CandidateId::new("ghost"), BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CandidateNotFound(_)));
}

// ============================================================================
// SECTION: Cancel and Retry
// ============================================================================

#[tokio::test]
async fn cancel_resets_a_running_candidate() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap();

    harness.service.cancel(&mig_id(), &cand_id()).await.unwrap();
    assert_eq!(harness.candidate_status("cand1"), CandidateStatus::NotStarted);
    assert_eq!(harness.engine.cancelled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_requires_a_running_candidate() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let err = harness.service.cancel(&mig_id(), &cand_id()).await.unwrap_err();
    assert!(matches!(err, ServiceError::CandidateNotRunning(_)));
}

#[tokio::test]
async fn cancel_reconciles_a_run_the_engine_no_longer_knows() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap();
    harness.engine.cancel_not_found.store(true, Ordering::SeqCst);

    harness.service.cancel(&mig_id(), &cand_id()).await.unwrap();
    assert_eq!(harness.candidate_status("cand1"), CandidateStatus::NotStarted);
}

#[tokio::test]
async fn retry_step_raises_the_retry_signal() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap();

    harness.service.retry_step(&mig_id(), &cand_id(), &StepName::new("A")).await.unwrap();

    let raised = harness.engine.raised();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].1.as_str(), "retry-step:A:cand1");
    assert!(raised[0].2.is_none());
}

#[tokio::test]
async fn update_inputs_merges_metadata_and_signals_a_running_candidate() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap();

    let update: BTreeMap<String, String> =
        [("env".to_string(), "prod".to_string())].into_iter().collect();
    harness.service.update_inputs(&mig_id(), &cand_id(), update).await.unwrap();

    let candidates = harness.service.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates[0].metadata.get("env").map(String::as_str), Some("prod"));

    let raised = harness.engine.raised();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].1.as_str(), "update-inputs:cand1");
}

#[tokio::test]
async fn update_inputs_skips_the_signal_for_idle_candidates() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let update: BTreeMap<String, String> =
        [("env".to_string(), "prod".to_string())].into_iter().collect();
    harness.service.update_inputs(&mig_id(), &cand_id(), update).await.unwrap();

    assert!(harness.engine.raised().is_empty());
    let candidates = harness.service.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates[0].metadata.get("env").map(String::as_str), Some("prod"));
}

#[tokio::test]
async fn retry_step_requires_a_running_candidate() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let err =
        harness.service.retry_step(&mig_id(), &cand_id(), &StepName::new("A")).await.unwrap_err();
    assert!(matches!(err, ServiceError::CandidateNotRunning(_)));
}

// ============================================================================
// SECTION: Event Handling
// ============================================================================

fn status_event(step: &str, status: StepStatus) -> StepStatusEvent {
    StepStatusEvent {
        step_name: StepName::new(step),
        candidate_id: CandidateId::new("cand1"),
        status,
        metadata: BTreeMap::new(),
    }
}

#[tokio::test]
async fn handle_event_routes_the_completion_signal_and_records_telemetry() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    let run_id = RunId::parse("mig1__cand1").unwrap();

    harness.service.handle_event(&run_id, status_event("A", StepStatus::Succeeded)).await.unwrap();

    let raised = harness.engine.raised();
    assert_eq!(raised[0].1.as_str(), "step-completed:A:cand1");
    assert!(raised[0].2.is_some());

    let records = harness.events.list(Some(&mig_id())).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_type, StepEventType::Callback);
    assert_eq!(records[0].status, StepStatus::Succeeded);
}

#[tokio::test]
async fn handle_event_survives_a_telemetry_append_failure() {
    let harness = Harness::with_events(SharedStepEventStore::from_store(FailingEventStore));
    harness.seed(vec![candidate("cand1")]);
    let run_id = RunId::parse("mig1__cand1").unwrap();

    harness.service.handle_event(&run_id, status_event("A", StepStatus::Failed)).await.unwrap();
    assert_eq!(harness.engine.raised().len(), 1);
}

// ============================================================================
// SECTION: Reads
// ============================================================================

#[tokio::test]
async fn candidate_steps_joins_engine_state_with_template_descriptions() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);
    harness.engine.set_status(RunStatusReport {
        runtime_status: RuntimeStatus::Running,
        steps: vec![StepState {
            step_name: StepName::new("A"),
            candidate_id: cand_id(),
            status: StepStatus::InProgress,
            metadata: BTreeMap::new(),
        }],
    });

    let view = harness.service.candidate_steps(&mig_id(), &cand_id()).await.unwrap();
    assert_eq!(view.runtime_status, Some(RuntimeStatus::Running));
    assert_eq!(view.steps.len(), 1);
    assert_eq!(view.steps[0].description, "step A");
}

#[tokio::test]
async fn candidate_steps_falls_back_to_the_durable_view_without_a_run() {
    let harness = Harness::new();
    harness.seed(vec![candidate("cand1")]);

    let view = harness.service.candidate_steps(&mig_id(), &cand_id()).await.unwrap();
    assert_eq!(view.runtime_status, None);
    assert!(view.steps.is_empty());
    assert_eq!(view.candidate_status, CandidateStatus::NotStarted);
}

#[tokio::test]
async fn dry_run_uses_the_candidate_override_step_list() {
    let harness = Harness::new();
    harness.seed(Vec::new());

    let mut overridden = candidate("cand9");
    overridden.steps = Some(vec![step("C")]);
    harness.service.dry_run(&mig_id(), overridden).await.unwrap();

    let last = harness.dry_runner.last.lock().unwrap().clone().unwrap();
    assert_eq!(last.0, "https://migrator.example");
    assert_eq!(last.1.steps.len(), 1);
    assert_eq!(last.1.steps[0].name.as_str(), "C");
}

#[tokio::test]
async fn dry_run_defaults_to_the_template_step_list() {
    let harness = Harness::new();
    harness.seed(Vec::new());

    harness.service.dry_run(&mig_id(), candidate("cand9")).await.unwrap();

    let last = harness.dry_runner.last.lock().unwrap().clone().unwrap();
    let names: Vec<&str> = last.1.steps.iter().map(|step| step.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn get_returns_none_for_unknown_migrations() {
    let harness = Harness::new();
    assert!(harness.service.get(&MigrationId::new("ghost")).unwrap().is_none());
}
