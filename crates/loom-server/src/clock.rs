// crates/loom-server/src/clock.rs
// ============================================================================
// Module: Server Clock
// Description: Wall-clock implementation of the core clock port.
// Purpose: Supply unix-millisecond timestamps at the process edge.
// Dependencies: loom-core
// ============================================================================

//! ## Overview
//! The core never reads wall-clock time; this is the host-side clock wired
//! into the service and the run sequencer at server boot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use loom_core::Clock;
use loom_core::Timestamp;

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Wall clock reporting unix epoch milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis())
            .unwrap_or_default();
        Timestamp::UnixMillis(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}
