// crates/loom-core/src/runtime/mod.rs
// ============================================================================
// Module: Loom Runtime
// Description: Run sequencer, orchestration service, metrics, and helpers.
// Purpose: Execute Loom migrations against the storage, engine, and migrator ports.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the per-candidate run sequencer, the
//! orchestration service facade, and the metrics read models. All transports
//! must call into the same service methods to preserve the candidate status
//! machine's invariants.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod metrics;
pub mod sequencer;
pub mod service;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use metrics::MetricsOverview;
pub use metrics::StepMetricsEntry;
pub use metrics::TimelineBucket;
pub use sequencer::CANDIDATE_RUN_PROGRAM;
pub use sequencer::CandidateRun;
pub use service::CandidateStepsView;
pub use service::OrchestrationService;
pub use service::ServiceError;
pub use service::StepStateView;
pub use store::InMemoryRegistryStore;
pub use store::InMemoryStepEventStore;
pub use store::LogicalClock;
pub use store::SharedRegistryStore;
pub use store::SharedStepEventStore;
