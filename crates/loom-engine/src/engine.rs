// crates/loom-engine/src/engine.rs
// ============================================================================
// Module: Loom Local Execution Engine
// Description: In-process execution engine with buffered signal delivery.
// Purpose: Run per-candidate programs on tokio behind the engine port.
// Dependencies: loom-core, tokio, serde_json
// ============================================================================

//! ## Overview
//! [`LocalExecutionEngine`] implements the [`loom_core::ExecutionEngine`]
//! port in-process. Each run executes its registered [`RunProgram`] on a
//! tokio task; signals are buffered per `(run, signal name)` FIFO until a
//! matching wait appears, which realizes the at-most-once delivery contract.
//! Cancellation is cooperative: the flag is observed at the program's next
//! wait point, so in-flight dispatch activities complete. Run state lives
//! for the process lifetime only; the port is the seam where a durable
//! workflow runtime would be substituted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use loom_core::EngineError;
use loom_core::ExecutionEngine;
use loom_core::RunContext;
use loom_core::RunId;
use loom_core::RunInput;
use loom_core::RunOutcome;
use loom_core::RunProgram;
use loom_core::RunStatusReport;
use loom_core::RuntimeStatus;
use loom_core::Signal;
use loom_core::SignalName;
use loom_core::StepState;
use loom_core::WaitError;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Engine construction errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EngineBuildError {
    /// No run programs were registered.
    #[error("engine requires at least one registered run program")]
    MissingPrograms,
}

/// Builder for the local execution engine.
///
/// # Invariants
/// - `build` succeeds only when at least one program is registered.
/// - Program registrations are keyed by name; later registrations overwrite
///   earlier ones.
#[derive(Default)]
pub struct LocalExecutionEngineBuilder {
    /// Program registry keyed by run name.
    programs: BTreeMap<String, Arc<dyn RunProgram>>,
}

impl LocalExecutionEngineBuilder {
    /// Registers a run program under its own name.
    #[must_use]
    pub fn program(mut self, program: impl RunProgram + 'static) -> Self {
        self.programs.insert(program.name().to_string(), Arc::new(program));
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineBuildError::MissingPrograms`] when no program is registered.
    pub fn build(self) -> Result<LocalExecutionEngine, EngineBuildError> {
        if self.programs.is_empty() {
            return Err(EngineBuildError::MissingPrograms);
        }
        Ok(LocalExecutionEngine {
            programs: self.programs,
            runs: Mutex::new(BTreeMap::new()),
        })
    }
}

// ============================================================================
// SECTION: Run State
// ============================================================================

/// Shared state of one run, also serving as the program's run context.
struct RunShared {
    /// Run identity.
    run_id: RunId,
    /// Engine-level runtime status.
    status: Mutex<RuntimeStatus>,
    /// Derived step view in first-dispatch order.
    steps: Mutex<Vec<StepState>>,
    /// Buffered signal payloads keyed by signal name.
    signals: Mutex<BTreeMap<String, VecDeque<Option<Value>>>>,
    /// Wakes the single waiter when a signal or cancellation arrives.
    notify: Notify,
    /// Cooperative cancellation flag.
    cancelled: AtomicBool,
}

impl RunShared {
    /// Creates fresh run state in the `RUNNING` status.
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            status: Mutex::new(RuntimeStatus::Running),
            steps: Mutex::new(Vec::new()),
            signals: Mutex::new(BTreeMap::new()),
            notify: Notify::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Snapshots the run status and step view.
    fn report(&self) -> RunStatusReport {
        let runtime_status =
            *self.status.lock().unwrap_or_else(PoisonError::into_inner);
        let steps = self.steps.lock().unwrap_or_else(PoisonError::into_inner).clone();
        RunStatusReport {
            runtime_status,
            steps,
        }
    }

    /// Records the terminal runtime status of the program.
    fn finish(&self, status: RuntimeStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Buffers a signal payload and wakes the waiter.
    fn push_signal(&self, signal: &SignalName, payload: Option<Value>) {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(signal.as_str().to_string())
            .or_default()
            .push_back(payload);
        self.notify.notify_one();
    }

    /// Pops the first buffered signal matching the waited names, in
    /// listed-order priority.
    fn pop_signal(&self, waited: &[SignalName]) -> Option<Signal> {
        let mut queues = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        for name in waited {
            if let Some(queue) = queues.get_mut(name.as_str())
                && let Some(payload) = queue.pop_front()
            {
                return Some(Signal {
                    name: name.clone(),
                    payload,
                });
            }
        }
        None
    }
}

#[async_trait]
impl RunContext for RunShared {
    fn run_id(&self) -> &RunId {
        &self.run_id
    }

    async fn wait_any(&self, signals: &[SignalName]) -> Result<Signal, WaitError> {
        // Single waiter per run: notify_one stores a permit when the waiter
        // is not yet parked, so a signal raised between the buffer check and
        // the await cannot be lost.
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(WaitError::Cancelled);
            }
            if let Some(signal) = self.pop_signal(signals) {
                return Ok(signal);
            }
            self.notify.notified().await;
        }
    }

    fn record_step(&self, state: StepState) {
        let mut steps = self.steps.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) =
            steps.iter_mut().find(|entry| entry.step_name == state.step_name)
        {
            *existing = state;
        } else {
            steps.push(state);
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// In-process execution engine running registered programs on tokio.
///
/// # Invariants
/// - At most one run exists per run id; `start_run` is idempotent.
/// - Signals are buffered until a matching wait appears and delivered
///   at-most-once per payload instance.
pub struct LocalExecutionEngine {
    /// Program registry keyed by run name.
    programs: BTreeMap<String, Arc<dyn RunProgram>>,
    /// Live and finished runs keyed by run id wire form.
    runs: Mutex<BTreeMap<String, Arc<RunShared>>>,
}

impl LocalExecutionEngine {
    /// Returns a builder for the engine.
    #[must_use]
    pub fn builder() -> LocalExecutionEngineBuilder {
        LocalExecutionEngineBuilder::default()
    }

    /// Looks up the shared state of a run.
    fn run(&self, run_id: &RunId) -> Result<Arc<RunShared>, EngineError> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id.to_string())
            .cloned()
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }
}

#[async_trait]
impl ExecutionEngine for LocalExecutionEngine {
    async fn start_run(
        &self,
        run_name: &str,
        run_id: &RunId,
        input: RunInput,
    ) -> Result<RunId, EngineError> {
        let program = self
            .programs
            .get(run_name)
            .cloned()
            .ok_or_else(|| EngineError::ProgramNotFound(run_name.to_string()))?;

        let shared = {
            let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = runs.get(&run_id.to_string()) {
                // Idempotent for live and completed runs; a failed (or
                // cancelled) run is replaced so the candidate can be
                // restarted from step zero.
                if existing.report().runtime_status != RuntimeStatus::Failed {
                    return Ok(run_id.clone());
                }
            }
            let shared = Arc::new(RunShared::new(run_id.clone()));
            runs.insert(run_id.to_string(), Arc::clone(&shared));
            shared
        };

        let ctx: Arc<dyn RunContext> = Arc::clone(&shared) as Arc<dyn RunContext>;
        drop(tokio::spawn(async move {
            let status = match program.execute(ctx, input).await {
                Ok(RunOutcome::Completed) => RuntimeStatus::Completed,
                Ok(RunOutcome::Cancelled) | Err(_) => RuntimeStatus::Failed,
            };
            shared.finish(status);
        }));
        Ok(run_id.clone())
    }

    async fn status(&self, run_id: &RunId) -> Result<RunStatusReport, EngineError> {
        Ok(self.run(run_id)?.report())
    }

    async fn raise_event(
        &self,
        run_id: &RunId,
        signal: &SignalName,
        payload: Option<Value>,
    ) -> Result<(), EngineError> {
        self.run(run_id)?.push_signal(signal, payload);
        Ok(())
    }

    async fn cancel_run(&self, run_id: &RunId) -> Result<(), EngineError> {
        let shared = self.run(run_id)?;
        shared.cancelled.store(true, Ordering::SeqCst);
        shared.notify.notify_one();
        Ok(())
    }
}
