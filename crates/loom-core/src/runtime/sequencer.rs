// crates/loom-core/src/runtime/sequencer.rs
// ============================================================================
// Module: Loom Run Sequencer
// Description: Per-candidate step sequencer executed by the execution engine.
// Purpose: Dispatch each step, wait for its completion signal, and advance.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`CandidateRun`] is the program the execution engine runs for a single
//! candidate. It walks the candidate's effective step list in order,
//! dispatches each step to the migrator, and suspends on the step's
//! deterministic completion signal while concurrently listening for retry and
//! input-update signals. The sequencer is pure over the signal stream: all
//! non-determinism (time, HTTP, storage) lives behind the injected ports, so
//! a durable engine can replay it deterministically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Candidate;
use crate::core::CandidateStatus;
use crate::core::Migration;
use crate::core::SignalName;
use crate::core::StepDefinition;
use crate::core::StepEventRecord;
use crate::core::StepEventType;
use crate::core::StepState;
use crate::core::StepStatus;
use crate::core::StepStatusEvent;
use crate::core::Timestamp;
use crate::interfaces::Clock;
use crate::interfaces::DispatchStepRequest;
use crate::interfaces::MigratorNotifier;
use crate::interfaces::RegistryStore;
use crate::interfaces::RunContext;
use crate::interfaces::RunError;
use crate::interfaces::RunInput;
use crate::interfaces::RunOutcome;
use crate::interfaces::RunProgram;
use crate::interfaces::StepEventStore;
use crate::interfaces::WaitError;
use crate::runtime::store::SharedRegistryStore;
use crate::runtime::store::SharedStepEventStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Program name the orchestration service starts candidate runs under.
pub const CANDIDATE_RUN_PROGRAM: &str = "CandidateRun";

/// Metadata key recording the last dispatch error on a failed step.
const DISPATCH_ERROR_KEY: &str = "dispatchError";

// ============================================================================
// SECTION: Candidate Run Program
// ============================================================================

/// Outcome of sequencing a single step.
enum StepOutcome {
    /// Step terminally succeeded; advance to the next index.
    Advanced,
    /// Cancellation was observed while the step was pending.
    Cancelled,
}

/// Per-candidate run program walking the effective step list in order.
pub struct CandidateRun {
    /// Outbound dispatch client.
    notifier: Arc<dyn MigratorNotifier>,
    /// Registry store used for the terminal candidate status write.
    registry: SharedRegistryStore,
    /// Telemetry store receiving dispatch records.
    events: SharedStepEventStore,
    /// Host clock used for telemetry timestamps and durations.
    clock: Arc<dyn Clock>,
}

impl CandidateRun {
    /// Creates a candidate run program over the provided ports.
    #[must_use]
    pub fn new(
        notifier: Arc<dyn MigratorNotifier>,
        registry: SharedRegistryStore,
        events: SharedStepEventStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifier,
            registry,
            events,
            clock,
        }
    }

    /// Dispatches one step to the migrator and publishes the resulting state.
    ///
    /// A rejected dispatch marks the step `failed` with the error recorded in
    /// its metadata; the run then holds for a retry signal exactly as it does
    /// for a worker-reported failure.
    async fn dispatch_step(
        &self,
        ctx: &dyn RunContext,
        migration: &Migration,
        candidate: &Candidate,
        step: &StepDefinition,
        event_name: &SignalName,
        state: &mut StepState,
    ) -> Timestamp {
        let request = DispatchStepRequest {
            migration_id: migration.id.clone(),
            migrator_app: step.migrator_app.clone(),
            migrator_url: migration.migrator_url.clone(),
            step_name: step.name.clone(),
            candidate: candidate.clone(),
            config: step.config.clone(),
            step_type: step.step_type.clone(),
            callback_id: ctx.run_id().clone(),
            event_name: event_name.clone(),
        };
        let dispatched_at = self.clock.now();
        match self.notifier.dispatch(&request).await {
            Ok(()) => {
                state.status = StepStatus::InProgress;
                self.append_event(migration, state, StepStatus::InProgress, None, dispatched_at);
            }
            Err(err) => {
                state.status = StepStatus::Failed;
                state.metadata.insert(DISPATCH_ERROR_KEY.to_string(), err.to_string());
                self.append_event(migration, state, StepStatus::Failed, None, dispatched_at);
            }
        }
        ctx.record_step(state.clone());
        dispatched_at
    }

    /// Sequences one step: dispatch, suspend, and handle signals until the
    /// step terminally succeeds or the run is cancelled.
    async fn run_step(
        &self,
        ctx: &dyn RunContext,
        migration: &Migration,
        candidate: &mut Candidate,
        step: &StepDefinition,
    ) -> Result<StepOutcome, RunError> {
        let completed = SignalName::step_completed(&step.name, &candidate.id);
        let retry = SignalName::retry_step(&step.name, &candidate.id);
        let update = SignalName::update_inputs(&candidate.id);
        let waited = [completed.clone(), retry.clone(), update.clone()];

        let mut state = StepState {
            step_name: step.name.clone(),
            candidate_id: candidate.id.clone(),
            status: StepStatus::InProgress,
            metadata: BTreeMap::new(),
        };
        let mut dispatched_at =
            self.dispatch_step(ctx, migration, candidate, step, &completed, &mut state).await;

        loop {
            let signal = match ctx.wait_any(&waited).await {
                Ok(signal) => signal,
                Err(WaitError::Cancelled) => return Ok(StepOutcome::Cancelled),
            };

            if signal.name == update {
                if let Some(inputs) = signal
                    .payload
                    .and_then(|payload| {
                        serde_json::from_value::<BTreeMap<String, String>>(payload).ok()
                    })
                {
                    candidate.metadata.extend(inputs);
                }
                continue;
            }

            if signal.name == retry {
                state.status = StepStatus::InProgress;
                state.metadata.remove(DISPATCH_ERROR_KEY);
                dispatched_at =
                    self.dispatch_step(ctx, migration, candidate, step, &completed, &mut state)
                        .await;
                continue;
            }

            // Malformed completion payloads are dropped; the worker posts a
            // fresh event with a valid body.
            let Some(event) = signal
                .payload
                .and_then(|payload| serde_json::from_value::<StepStatusEvent>(payload).ok())
            else {
                continue;
            };

            match event.status {
                StepStatus::Pending | StepStatus::InProgress => {
                    state.merge_metadata(&event.metadata);
                    ctx.record_step(state.clone());
                }
                StepStatus::Succeeded | StepStatus::Merged => {
                    state.status = event.status;
                    state.merge_metadata(&event.metadata);
                    ctx.record_step(state.clone());
                    let now = self.clock.now();
                    self.append_event(
                        migration,
                        &state,
                        event.status,
                        now.millis_since(&dispatched_at),
                        now,
                    );
                    return Ok(StepOutcome::Advanced);
                }
                StepStatus::Failed => {
                    state.status = StepStatus::Failed;
                    state.merge_metadata(&event.metadata);
                    ctx.record_step(state.clone());
                    let now = self.clock.now();
                    self.append_event(
                        migration,
                        &state,
                        StepStatus::Failed,
                        now.millis_since(&dispatched_at),
                        now,
                    );
                }
            }
        }
    }

    /// Appends a dispatch-side telemetry record, best effort.
    fn append_event(
        &self,
        migration: &Migration,
        state: &StepState,
        status: StepStatus,
        duration_ms: Option<u64>,
        created_at: Timestamp,
    ) {
        let record = StepEventRecord {
            migration_id: migration.id.clone(),
            candidate_id: state.candidate_id.clone(),
            step_name: state.step_name.clone(),
            event_type: StepEventType::Dispatch,
            status,
            duration_ms,
            metadata: state.metadata.clone(),
            created_at,
        };
        let _ = self.events.append(&record);
    }
}

#[async_trait]
impl RunProgram for CandidateRun {
    fn name(&self) -> &str {
        CANDIDATE_RUN_PROGRAM
    }

    async fn execute(
        &self,
        ctx: Arc<dyn RunContext>,
        input: RunInput,
    ) -> Result<RunOutcome, RunError> {
        let RunInput {
            migration,
            mut candidate,
            initial_inputs,
        } = input;
        candidate.metadata.extend(initial_inputs);
        let steps = migration.steps_for(&candidate).to_vec();

        for step in &steps {
            match self.run_step(ctx.as_ref(), &migration, &mut candidate, step).await? {
                StepOutcome::Advanced => {}
                StepOutcome::Cancelled => return Ok(RunOutcome::Cancelled),
            }
        }

        // The final activity of a completed run: the registry flips to
        // `completed` only after every step terminally succeeded.
        self.registry.set_candidate_status(
            &migration.id,
            &candidate.id,
            CandidateStatus::Completed,
        )?;
        Ok(RunOutcome::Completed)
    }
}
