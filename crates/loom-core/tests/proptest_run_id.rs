// crates/loom-core/tests/proptest_run_id.rs
// ============================================================================
// Module: Run Identifier Property Tests
// Description: Property-based round-trip coverage for run id parsing.
// ============================================================================
//! ## Overview
//! For every non-empty component pair where the migration id carries no
//! separator, the wire form parses back to the original pair. Candidate ids
//! may themselves contain the separator.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use loom_core::CandidateId;
use loom_core::MigrationId;
use loom_core::RunId;
use proptest::prelude::proptest;

proptest! {
    #[test]
    fn round_trip_preserves_components(
        migration in "[a-z0-9][a-z0-9.-]{0,24}",
        candidate in "[a-z0-9][a-z0-9._-]{0,24}",
    ) {
        let run_id =
            RunId::new(MigrationId::new(migration.as_str()), CandidateId::new(candidate.as_str()))
                .unwrap();
        let parsed = RunId::parse(&run_id.to_string()).unwrap();
        assert_eq!(parsed.migration_id().as_str(), migration);
        assert_eq!(parsed.candidate_id().as_str(), candidate);
    }

    #[test]
    fn wire_form_never_parses_to_empty_components(raw in "[a-z_]{0,40}") {
        if let Ok(parsed) = RunId::parse(&raw) {
            assert!(!parsed.migration_id().as_str().is_empty());
            assert!(!parsed.candidate_id().as_str().is_empty());
        }
    }
}
