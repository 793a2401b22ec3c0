// crates/loom-core/src/core/time.rs
// ============================================================================
// Module: Loom Time Model
// Description: Canonical timestamp representations for runs and telemetry.
// Purpose: Provide deterministic, replayable time values across Loom records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Loom uses explicit time values embedded in telemetry records to keep run
//! replay deterministic. The core never reads wall-clock time directly;
//! hosts supply timestamps through the [`crate::interfaces::Clock`] port.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in Loom telemetry and read models.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }

    /// Returns the timestamp as logical time when available.
    #[must_use]
    pub const fn as_logical(&self) -> Option<u64> {
        match self {
            Self::UnixMillis(_) => None,
            Self::Logical(value) => Some(*value),
        }
    }

    /// Returns the millisecond delta from `earlier` to `self` when both
    /// timestamps share a representation and the delta is non-negative.
    #[must_use]
    pub const fn millis_since(&self, earlier: &Self) -> Option<u64> {
        match (earlier, self) {
            (Self::UnixMillis(start), Self::UnixMillis(end)) => {
                if *end >= *start {
                    Some(end.abs_diff(*start))
                } else {
                    None
                }
            }
            (Self::Logical(start), Self::Logical(end)) => end.checked_sub(*start),
            _ => None,
        }
    }
}
