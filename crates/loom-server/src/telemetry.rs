// crates/loom-server/src/telemetry.rs
// ============================================================================
// Module: Server Telemetry
// Description: Observability hooks for HTTP request handling.
// Purpose: Provide request metric events without hard dependencies.
// Dependencies: none
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for HTTP request counters.
//! It is intentionally dependency-light so deployments can plug in
//! Prometheus or OpenTelemetry without redesign.
//! Security posture: telemetry must avoid leaking payloads and treat labels
//! as untrusted.

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// HTTP request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RequestOutcome {
    /// Successful request (2xx).
    Ok,
    /// Failed request.
    Error,
}

impl RequestOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }

    /// Classifies an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        if status < 400 { Self::Ok } else { Self::Error }
    }
}

/// HTTP request metric event payload.
///
/// # Invariants
/// - `route` is the static route label, never the raw request path.
#[derive(Debug, Clone)]
pub struct RequestMetricEvent {
    /// Static route label.
    pub route: &'static str,
    /// Response status code.
    pub status: u16,
    /// Request outcome classification.
    pub outcome: RequestOutcome,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for HTTP requests.
pub trait RequestMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: RequestMetricEvent);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl RequestMetrics for NoopMetrics {
    fn record_request(&self, _event: RequestMetricEvent) {}
}
