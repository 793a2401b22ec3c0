// crates/loom-server/src/correlation.rs
// ============================================================================
// Module: Server Correlation
// Description: Server-issued correlation identifiers for responses and logs.
// Purpose: Tie operator-visible errors back to audit entries and runs.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Every response carries a server-issued correlation header. Run-scoped
//! routes use the run id verbatim so operators can correlate console errors,
//! audit lines, and engine state; other routes get a monotonic request id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Response header carrying the server-issued correlation identifier.
pub const SERVER_CORRELATION_HEADER: &str = "x-loom-correlation-id";

/// Process-wide request counter for non-run-scoped correlation ids.
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the next request-scoped correlation identifier.
#[must_use]
pub fn next_request_id() -> String {
    format!("req-{}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed))
}
