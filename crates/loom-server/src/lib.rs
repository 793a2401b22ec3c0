// crates/loom-server/src/lib.rs
// ============================================================================
// Module: Loom Server Library
// Description: HTTP transport for the Loom orchestration service.
// Purpose: Expose routes, wiring, and observability hooks for the server.
// Dependencies: axum, loom-config, loom-core, loom-engine
// ============================================================================

//! ## Overview
//! Loom Server mounts the fixed HTTP route table over the orchestration
//! service, wires storage and migrator adapters from configuration, and
//! provides dependency-light metrics and audit hooks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod clock;
pub mod correlation;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use clock::SystemClock;
pub use correlation::SERVER_CORRELATION_HEADER;
pub use error::ApiError;
pub use routes::router;
pub use server::LoomServer;
pub use server::ServerError;
pub use state::ServerState;
pub use state::build_server_state;
pub use state::build_server_state_with_observability;
pub use telemetry::NoopMetrics;
pub use telemetry::RequestMetricEvent;
pub use telemetry::RequestMetrics;
pub use telemetry::RequestOutcome;
