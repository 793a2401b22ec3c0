// crates/loom-engine/tests/scenarios.rs
// ============================================================================
// Module: End-to-End Orchestration Scenarios
// Description: Full-stack scenarios over service, engine, and sequencer.
// ============================================================================
//! ## Overview
//! Runs the orchestration service against the real local engine and candidate
//! run program, with a recording migrator fixture standing in for the worker:
//! happy path, intermediate PR updates, failure and retry, cancellation,
//! idempotent announcement, and required-input gating.

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
use std::time::Duration;

use async_trait::async_trait;
use loom_core::Candidate;
use loom_core::CandidateId;
use loom_core::CandidateRun;
use loom_core::CandidateStatus;
use loom_core::Clock;
use loom_core::DispatchStepRequest;
use loom_core::DryRunError;
use loom_core::DryRunRequest;
use loom_core::DryRunResult;
use loom_core::DryRunner;
use loom_core::ExecutionEngine;
use loom_core::InMemoryRegistryStore;
use loom_core::InMemoryStepEventStore;
use loom_core::InputDefinition;
use loom_core::LogicalClock;
use loom_core::MigrationAnnouncement;
use loom_core::MigrationId;
use loom_core::MigratorApp;
use loom_core::MigratorNotifier;
use loom_core::NotifyError;
use loom_core::OrchestrationService;
use loom_core::RunId;
use loom_core::RuntimeStatus;
use loom_core::ServiceError;
use loom_core::SharedRegistryStore;
use loom_core::SharedStepEventStore;
use loom_core::StepDefinition;
use loom_core::StepEventStore;
use loom_core::StepEventType;
use loom_core::StepName;
use loom_core::StepStatus;
use loom_core::StepStatusEvent;
use loom_engine::LocalExecutionEngine;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Migrator stand-in recording every dispatch request.
#[derive(Default)]
struct RecordingMigrator {
    /// Dispatch requests in call order.
    requests: Mutex<Vec<DispatchStepRequest>>,
}

impl RecordingMigrator {
    fn requests(&self) -> Vec<DispatchStepRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MigratorNotifier for RecordingMigrator {
    async fn dispatch(&self, request: &DispatchStepRequest) -> Result<(), NotifyError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Dry-runner stand-in returning an empty result.
struct NoopDryRunner;

#[async_trait]
impl DryRunner for NoopDryRunner {
    async fn dry_run(
        &self,
        _migrator_url: &str,
        _request: &DryRunRequest,
    ) -> Result<DryRunResult, DryRunError> {
        Ok(DryRunResult {
            steps: Vec::new(),
        })
    }
}

/// Full-stack harness: service over the real engine and sequencer.
struct Stack {
    service: OrchestrationService,
    migrator: Arc<RecordingMigrator>,
    events: SharedStepEventStore,
}

impl Stack {
    fn new() -> Self {
        let registry = SharedRegistryStore::from_store(InMemoryRegistryStore::new());
        let events = SharedStepEventStore::from_store(InMemoryStepEventStore::new());
        let clock: Arc<dyn Clock> = Arc::new(LogicalClock::new());
        let migrator = Arc::new(RecordingMigrator::default());

        let program = CandidateRun::new(
            Arc::clone(&migrator) as Arc<dyn MigratorNotifier>,
            registry.clone(),
            events.clone(),
            Arc::clone(&clock),
        );
        let engine = LocalExecutionEngine::builder().program(program).build().unwrap();
        let service = OrchestrationService::new(
            registry,
            events.clone(),
            Arc::new(engine) as Arc<dyn ExecutionEngine>,
            Arc::new(NoopDryRunner),
            clock,
        );
        Self {
            service,
            migrator,
            events,
        }
    }

    fn announce(&self, steps: Vec<StepDefinition>, required_inputs: Vec<InputDefinition>) {
        self.service
            .announce(MigrationAnnouncement {
                id: MigrationId::new("mig1"),
                name: "Migration One".to_string(),
                description: String::new(),
                steps,
                required_inputs,
                migrator_url: "https://migrator.example".to_string(),
            })
            .unwrap();
        self.service
            .submit_candidates(&mig_id(), vec![candidate("cand1")])
            .unwrap();
    }

    async fn start(&self) -> RunId {
        self.service.start(&mig_id(), &cand_id(), BTreeMap::new()).await.unwrap()
    }

    async fn post_event(&self, run_id: &RunId, step: &str, status: StepStatus, metadata: &[(&str, &str)]) {
        let event = StepStatusEvent {
            step_name: StepName::new(step),
            candidate_id: cand_id(),
            status,
            metadata: metadata
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
        };
        self.service.handle_event(run_id, event).await.unwrap();
    }

    fn candidate_status(&self) -> CandidateStatus {
        self.service.get_candidates(&mig_id()).unwrap()[0].status
    }

    async fn wait_dispatches(&self, count: usize) {
        wait_until(|| self.migrator.requests().len() >= count, "dispatch count").await;
    }

    async fn wait_candidate_status(&self, expected: CandidateStatus) {
        wait_until(|| self.candidate_status() == expected, "candidate status").await;
    }
}

fn mig_id() -> MigrationId {
    MigrationId::new("mig1")
}

fn cand_id() -> CandidateId {
    CandidateId::new("cand1")
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
        kind: "app".to_string(),
        metadata: BTreeMap::new(),
        files: None,
        steps: None,
        status: CandidateStatus::NotStarted,
    }
}

/// Polls a condition until it holds or the deadline expires.
async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Polls the candidate view until the predicate holds or the deadline expires.
async fn wait_view(
    stack: &Stack,
    condition: impl Fn(&loom_core::CandidateStepsView) -> bool,
    what: &str,
) {
    for _ in 0..400 {
        if let Ok(view) = stack.service.candidate_steps(&mig_id(), &cand_id()).await
            && condition(&view)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn s1_happy_path_runs_two_steps_in_order() {
    let stack = Stack::new();
    stack.announce(vec![step("A"), step("B")], Vec::new());

    let run_id = stack.start().await;
    assert_eq!(run_id.to_string(), "mig1__cand1");

    stack.wait_dispatches(1).await;
    assert_eq!(stack.migrator.requests()[0].step_name.as_str(), "A");
    stack.post_event(&run_id, "A", StepStatus::Succeeded, &[]).await;

    stack.wait_dispatches(2).await;
    assert_eq!(stack.migrator.requests()[1].step_name.as_str(), "B");
    stack.post_event(&run_id, "B", StepStatus::Succeeded, &[]).await;

    stack.wait_candidate_status(CandidateStatus::Completed).await;

    let view = stack.service.candidate_steps(&mig_id(), &cand_id()).await.unwrap();
    assert_eq!(view.runtime_status, Some(RuntimeStatus::Completed));
    let statuses: Vec<StepStatus> = view.steps.iter().map(|entry| entry.state.status).collect();
    assert_eq!(statuses, vec![StepStatus::Succeeded, StepStatus::Succeeded]);
    let names: Vec<&str> = view.steps.iter().map(|entry| entry.state.step_name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn s2_pr_opened_then_merged_updates_step_metadata_in_place() {
    let stack = Stack::new();
    stack.announce(vec![step("A")], Vec::new());
    let run_id = stack.start().await;
    stack.wait_dispatches(1).await;

    stack.post_event(&run_id, "A", StepStatus::Pending, &[("prUrl", "http://pr/1")]).await;
    wait_view(
        &stack,
        |view| {
            view.steps.len() == 1
                && view.steps[0].state.status == StepStatus::InProgress
                && view.steps[0].state.metadata.get("prUrl").map(String::as_str)
                    == Some("http://pr/1")
        },
        "pending pr metadata",
    )
    .await;

    stack
        .post_event(
            &run_id,
            "A",
            StepStatus::Merged,
            &[("prUrl", "http://pr/1"), ("commitSha", "deadbeef")],
        )
        .await;
    stack.wait_candidate_status(CandidateStatus::Completed).await;

    let view = stack.service.candidate_steps(&mig_id(), &cand_id()).await.unwrap();
    assert_eq!(view.steps.len(), 1);
    assert_eq!(view.steps[0].state.status, StepStatus::Merged);
    assert_eq!(view.steps[0].state.metadata.get("commitSha").map(String::as_str), Some("deadbeef"));
    assert_eq!(view.steps[0].state.metadata.get("prUrl").map(String::as_str), Some("http://pr/1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn s3_failed_step_retries_without_rerunning_earlier_steps() {
    let stack = Stack::new();
    stack.announce(vec![step("A")], Vec::new());
    let run_id = stack.start().await;
    stack.wait_dispatches(1).await;

    stack.post_event(&run_id, "A", StepStatus::Failed, &[]).await;
    wait_view(
        &stack,
        |view| {
            view.steps.first().is_some_and(|entry| entry.state.status == StepStatus::Failed)
        },
        "failed step state",
    )
    .await;
    assert_eq!(stack.candidate_status(), CandidateStatus::Running);

    stack.service.retry_step(&mig_id(), &cand_id(), &StepName::new("A")).await.unwrap();
    stack.wait_dispatches(2).await;
    stack.post_event(&run_id, "A", StepStatus::Succeeded, &[]).await;
    stack.wait_candidate_status(CandidateStatus::Completed).await;

    // The step name appears twice in dispatch telemetry: failed, then succeeded.
    let statuses: Vec<StepStatus> = stack
        .events
        .list(None)
        .unwrap()
        .into_iter()
        .filter(|record| {
            record.event_type == StepEventType::Dispatch
                && record.status.is_terminal()
                && record.step_name.as_str() == "A"
        })
        .map(|record| record.status)
        .collect();
    assert_eq!(statuses, vec![StepStatus::Failed, StepStatus::Succeeded]);
}

#[tokio::test(flavor = "multi_thread")]
async fn s4_cancel_mid_step_resets_and_a_new_start_begins_from_step_zero() {
    let stack = Stack::new();
    stack.announce(vec![step("A"), step("B")], Vec::new());
    let run_id = stack.start().await;

    stack.wait_dispatches(1).await;
    stack.post_event(&run_id, "A", StepStatus::Succeeded, &[]).await;
    stack.wait_dispatches(2).await;

    stack.service.cancel(&mig_id(), &cand_id()).await.unwrap();
    assert_eq!(stack.candidate_status(), CandidateStatus::NotStarted);
    wait_view(
        &stack,
        |view| view.runtime_status == Some(RuntimeStatus::Failed),
        "cancelled run status",
    )
    .await;

    let restarted = stack.start().await;
    assert_eq!(restarted, run_id);
    stack.wait_dispatches(3).await;
    assert_eq!(stack.migrator.requests()[2].step_name.as_str(), "A");
}

#[tokio::test(flavor = "multi_thread")]
async fn s5_idempotent_announce_preserves_candidate_status() {
    let stack = Stack::new();
    stack.announce(vec![step("A")], Vec::new());
    let _run_id = stack.start().await;
    stack.wait_dispatches(1).await;
    assert_eq!(stack.candidate_status(), CandidateStatus::Running);

    stack
        .service
        .announce(MigrationAnnouncement {
            id: mig_id(),
            name: "Migration One".to_string(),
            description: "announced again".to_string(),
            steps: vec![step("A")],
            required_inputs: Vec::new(),
            migrator_url: "https://migrator.example".to_string(),
        })
        .unwrap();
    stack
        .service
        .submit_candidates(&mig_id(), vec![candidate("cand1"), candidate("cand2")])
        .unwrap();

    let candidates = stack.service.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].status, CandidateStatus::Running);
    assert_eq!(candidates[1].status, CandidateStatus::NotStarted);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_starts_yield_one_run_with_the_same_id() {
    let stack = Stack::new();
    stack.announce(vec![step("A")], Vec::new());

    let mig_id = mig_id();
    let cand_id = cand_id();
    let first = stack.service.start(&mig_id, &cand_id, BTreeMap::new());
    let second = stack.service.start(&mig_id, &cand_id, BTreeMap::new());
    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap(), second.unwrap());

    stack.wait_dispatches(1).await;
    // Give a hypothetical duplicate run a chance to dispatch before asserting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stack.migrator.requests().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn s6_missing_required_inputs_never_reach_the_engine() {
    let stack = Stack::new();
    stack.announce(
        vec![step("A")],
        vec![InputDefinition {
            name: "env".to_string(),
            label: "Environment".to_string(),
        }],
    );

    let err = stack
        .service
        .start(&mig_id(), &cand_id(), BTreeMap::new())
        .await
        .unwrap_err();
    match err {
        ServiceError::MissingRequiredInputs {
            missing,
        } => assert_eq!(missing, vec!["env".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(stack.migrator.requests().is_empty());
    assert_eq!(stack.candidate_status(), CandidateStatus::NotStarted);

    // Supplying the input at start satisfies the gate.
    let inputs: BTreeMap<String, String> =
        [("env".to_string(), "prod".to_string())].into_iter().collect();
    stack.service.start(&mig_id(), &cand_id(), inputs).await.unwrap();
    stack.wait_dispatches(1).await;
    assert_eq!(
        stack.migrator.requests()[0].candidate.metadata.get("env").map(String::as_str),
        Some("prod")
    );
}
