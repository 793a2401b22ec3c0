// crates/loom-engine/tests/engine.rs
// ============================================================================
// Module: Local Engine Tests
// Description: Tests for signal buffering, idempotent starts, and cancellation.
// ============================================================================
//! ## Overview
//! Drives the local execution engine with a scripted wait program, validating
//! buffered delivery, idempotency, step-view upserts, and cooperative
//! cancellation.

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
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::Candidate;
use loom_core::CandidateId;
use loom_core::CandidateStatus;
use loom_core::EngineError;
use loom_core::ExecutionEngine;
use loom_core::Migration;
use loom_core::MigrationId;
use loom_core::RunContext;
use loom_core::RunError;
use loom_core::RunId;
use loom_core::RunInput;
use loom_core::RunOutcome;
use loom_core::RunProgram;
use loom_core::RuntimeStatus;
use loom_core::Signal;
use loom_core::SignalName;
use loom_core::StepName;
use loom_core::StepState;
use loom_core::StepStatus;
use loom_engine::LocalExecutionEngine;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Program waiting for a scripted signal sequence and recording step states.
struct ScriptedWaits {
    /// Signals awaited in order.
    waits: Vec<SignalName>,
    /// Step states published before the first wait.
    publish: Vec<StepState>,
    /// Number of executions observed.
    executions: Arc<AtomicUsize>,
    /// Signals received with payloads.
    received: Arc<Mutex<Vec<Signal>>>,
}

impl ScriptedWaits {
    fn new(waits: Vec<SignalName>, publish: Vec<StepState>) -> Self {
        Self {
            waits,
            publish,
            executions: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RunProgram for ScriptedWaits {
    fn name(&self) -> &str {
        "ScriptedWaits"
    }

    async fn execute(
        &self,
        ctx: Arc<dyn RunContext>,
        _input: RunInput,
    ) -> Result<RunOutcome, RunError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        for state in &self.publish {
            ctx.record_step(state.clone());
        }
        for wait in &self.waits {
            match ctx.wait_any(std::slice::from_ref(wait)).await {
                Ok(signal) => self.received.lock().unwrap().push(signal),
                Err(_) => return Ok(RunOutcome::Cancelled),
            }
        }
        Ok(RunOutcome::Completed)
    }
}

fn run_id() -> RunId {
    RunId::new(MigrationId::new("mig1"), CandidateId::new("cand1")).unwrap()
}

fn run_input() -> RunInput {
    RunInput {
        migration: Migration {
            id: MigrationId::new("mig1"),
            name: "Migration One".to_string(),
            description: String::new(),
            steps: Vec::new(),
            required_inputs: Vec::new(),
            migrator_url: "https://migrator.example".to_string(),
            candidates: Vec::new(),
        },
        candidate: Candidate {
            id: CandidateId::new("cand1"),
            kind: "repository".to_string(),
            metadata: BTreeMap::new(),
            files: None,
            steps: None,
            status: CandidateStatus::Running,
        },
        initial_inputs: BTreeMap::new(),
    }
}

fn step_state(name: &str, status: StepStatus) -> StepState {
    StepState {
        step_name: StepName::new(name),
        candidate_id: CandidateId::new("cand1"),
        status,
        metadata: BTreeMap::new(),
    }
}

async fn wait_for_status(
    engine: &LocalExecutionEngine,
    run_id: &RunId,
    expected: RuntimeStatus,
) {
    for _ in 0..200 {
        if engine.status(run_id).await.unwrap().runtime_status == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run never reached {expected:?}");
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn signals_raised_before_the_wait_are_buffered() {
    let first = SignalName::new("first");
    let second = SignalName::new("second");
    let program = ScriptedWaits::new(vec![first.clone(), second.clone()], Vec::new());
    let received = Arc::clone(&program.received);
    let engine = LocalExecutionEngine::builder().program(program).build().unwrap();

    let id = run_id();
    engine.start_run("ScriptedWaits", &id, run_input()).await.unwrap();

    // Deliver out of order: the run is waiting on `first`, so `second` must
    // be buffered until its wait appears.
    engine.raise_event(&id, &second, Some(json!({"order": 2}))).await.unwrap();
    engine.raise_event(&id, &first, Some(json!({"order": 1}))).await.unwrap();

    wait_for_status(&engine, &id, RuntimeStatus::Completed).await;
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].name, first);
    assert_eq!(received[1].name, second);
    assert_eq!(received[1].payload, Some(json!({"order": 2})));
}

#[tokio::test]
async fn start_run_is_idempotent_while_the_run_is_live() {
    let go = SignalName::new("go");
    let program = ScriptedWaits::new(vec![go.clone()], Vec::new());
    let executions = Arc::clone(&program.executions);
    let engine = LocalExecutionEngine::builder().program(program).build().unwrap();

    let id = run_id();
    engine.start_run("ScriptedWaits", &id, run_input()).await.unwrap();
    let again = engine.start_run("ScriptedWaits", &id, run_input()).await.unwrap();
    assert_eq!(again, id);

    engine.raise_event(&id, &go, None).await.unwrap();
    wait_for_status(&engine, &id, RuntimeStatus::Completed).await;
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_failed_run_is_replaced_by_a_fresh_start() {
    let go = SignalName::new("go");
    let program = ScriptedWaits::new(vec![go.clone()], Vec::new());
    let executions = Arc::clone(&program.executions);
    let engine = LocalExecutionEngine::builder().program(program).build().unwrap();

    let id = run_id();
    engine.start_run("ScriptedWaits", &id, run_input()).await.unwrap();
    engine.cancel_run(&id).await.unwrap();
    wait_for_status(&engine, &id, RuntimeStatus::Failed).await;

    engine.start_run("ScriptedWaits", &id, run_input()).await.unwrap();
    wait_for_status(&engine, &id, RuntimeStatus::Running).await;
    engine.raise_event(&id, &go, None).await.unwrap();
    wait_for_status(&engine, &id, RuntimeStatus::Completed).await;
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancellation_is_observed_at_the_next_wait_point() {
    let go = SignalName::new("go");
    let program = ScriptedWaits::new(vec![go], Vec::new());
    let engine = LocalExecutionEngine::builder().program(program).build().unwrap();

    let id = run_id();
    engine.start_run("ScriptedWaits", &id, run_input()).await.unwrap();
    engine.cancel_run(&id).await.unwrap();
    wait_for_status(&engine, &id, RuntimeStatus::Failed).await;
}

#[tokio::test]
async fn step_publications_upsert_by_step_name() {
    let program = ScriptedWaits::new(
        Vec::new(),
        vec![
            step_state("A", StepStatus::InProgress),
            step_state("B", StepStatus::InProgress),
            step_state("A", StepStatus::Succeeded),
        ],
    );
    let engine = LocalExecutionEngine::builder().program(program).build().unwrap();

    let id = run_id();
    engine.start_run("ScriptedWaits", &id, run_input()).await.unwrap();
    wait_for_status(&engine, &id, RuntimeStatus::Completed).await;

    let report = engine.status(&id).await.unwrap();
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[0].step_name.as_str(), "A");
    assert_eq!(report.steps[0].status, StepStatus::Succeeded);
    assert_eq!(report.steps[1].step_name.as_str(), "B");
}

#[tokio::test]
async fn unknown_runs_and_programs_are_rejected() {
    let program = ScriptedWaits::new(Vec::new(), Vec::new());
    let engine = LocalExecutionEngine::builder().program(program).build().unwrap();

    let id = run_id();
    assert!(matches!(engine.status(&id).await, Err(EngineError::RunNotFound(_))));
    assert!(matches!(
        engine.raise_event(&id, &SignalName::new("go"), None).await,
        Err(EngineError::RunNotFound(_))
    ));
    assert!(matches!(engine.cancel_run(&id).await, Err(EngineError::RunNotFound(_))));
    assert!(matches!(
        engine.start_run("Unknown", &id, run_input()).await,
        Err(EngineError::ProgramNotFound(_))
    ));
}

#[test]
fn the_builder_requires_at_least_one_program() {
    assert!(LocalExecutionEngine::builder().build().is_err());
}
