// crates/loom-core/src/lib.rs
// ============================================================================
// Module: Loom Core Library
// Description: Public API surface for the Loom orchestration core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Loom core provides the migration orchestration state machine: registry
//! entities, the per-candidate run sequencer, and the orchestration service.
//! It is backend-agnostic and integrates through explicit interfaces rather
//! than embedding into a particular transport or storage engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::Clock;
pub use interfaces::DiffStatus;
pub use interfaces::DispatchStepRequest;
pub use interfaces::DryRunError;
pub use interfaces::DryRunRequest;
pub use interfaces::DryRunResult;
pub use interfaces::DryRunStepResult;
pub use interfaces::DryRunner;
pub use interfaces::EngineError;
pub use interfaces::ExecutionEngine;
pub use interfaces::FileDiff;
pub use interfaces::MigratorNotifier;
pub use interfaces::NotifyError;
pub use interfaces::RegistryError;
pub use interfaces::RegistryStore;
pub use interfaces::RunContext;
pub use interfaces::RunError;
pub use interfaces::RunInput;
pub use interfaces::RunOutcome;
pub use interfaces::RunProgram;
pub use interfaces::StepEventError;
pub use interfaces::StepEventStore;
pub use interfaces::WaitError;
pub use runtime::CANDIDATE_RUN_PROGRAM;
pub use runtime::CandidateRun;
pub use runtime::CandidateStepsView;
pub use runtime::InMemoryRegistryStore;
pub use runtime::InMemoryStepEventStore;
pub use runtime::LogicalClock;
pub use runtime::MetricsOverview;
pub use runtime::OrchestrationService;
pub use runtime::ServiceError;
pub use runtime::SharedRegistryStore;
pub use runtime::SharedStepEventStore;
pub use runtime::StepMetricsEntry;
pub use runtime::StepStateView;
pub use runtime::TimelineBucket;
