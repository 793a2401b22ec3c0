// crates/loom-core/src/core/mod.rs
// ============================================================================
// Module: Loom Core Types
// Description: Canonical Loom registry and run-state structures.
// Purpose: Provide stable, serializable types for migrations, candidates, and runs.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Loom core types define migration templates, candidates, step state, signal
//! names, and telemetry records. These types are the canonical source of
//! truth for any derived API surfaces (HTTP or SDKs).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod migration;
pub mod signal;
pub mod step;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::CandidateId;
pub use identifiers::MigrationId;
pub use identifiers::MigratorApp;
pub use identifiers::RunId;
pub use identifiers::RunIdError;
pub use identifiers::StepName;
pub use migration::Candidate;
pub use migration::CandidateFileGroup;
pub use migration::CandidateStatus;
pub use migration::InputDefinition;
pub use migration::Migration;
pub use migration::MigrationAnnouncement;
pub use migration::StepDefinition;
pub use signal::Signal;
pub use signal::SignalName;
pub use step::RunStatusReport;
pub use step::RuntimeStatus;
pub use step::StepEventRecord;
pub use step::StepEventType;
pub use step::StepState;
pub use step::StepStatus;
pub use step::StepStatusEvent;
pub use time::Timestamp;
