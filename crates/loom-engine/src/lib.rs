// crates/loom-engine/src/lib.rs
// ============================================================================
// Module: Loom Engine Library
// Description: In-process execution engine adapter for the Loom engine port.
// Purpose: Schedule run programs and buffer their coordination signals.
// Dependencies: loom-core, tokio
// ============================================================================

//! ## Overview
//! Loom Engine provides the in-process implementation of the execution
//! engine port: programs run as tokio tasks, signals are buffered per run
//! until a matching wait appears, and cancellation is cooperative.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::EngineBuildError;
pub use engine::LocalExecutionEngine;
pub use engine::LocalExecutionEngineBuilder;
