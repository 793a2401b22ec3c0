// crates/loom-cli/src/serve_policy/tests.rs
// ============================================================================
// Module: Serve Policy Unit Tests
// Description: Unit tests for the loopback-only bind policy.
// Purpose: Validate fail-closed bind behavior and opt-in handling.
// Dependencies: loom-cli
// ============================================================================

//! ## Overview
//! Validates loopback acceptance, non-loopback refusal, and opt-in behavior
//! for the server launcher policy.

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

use super::ServePolicyError;
use super::enforce_local_only;
use super::resolve_allow_non_loopback;

#[test]
fn loopback_binds_are_always_allowed() {
    let outcome = enforce_local_only("127.0.0.1:7070", false).unwrap();
    assert!(!outcome.network_exposed);
    let outcome = enforce_local_only("[::1]:7070", false).unwrap();
    assert!(!outcome.network_exposed);
}

#[test]
fn non_loopback_binds_require_opt_in() {
    let err = enforce_local_only("0.0.0.0:7070", false).unwrap_err();
    assert!(matches!(err, ServePolicyError::NonLoopbackOptInRequired { .. }));

    let outcome = enforce_local_only("0.0.0.0:7070", true).unwrap();
    assert!(outcome.network_exposed);
}

#[test]
fn malformed_binds_are_rejected() {
    let err = enforce_local_only("localhost", false).unwrap_err();
    assert!(matches!(err, ServePolicyError::InvalidBind { .. }));
}

#[test]
fn the_cli_flag_short_circuits_the_environment() {
    assert!(resolve_allow_non_loopback(true).unwrap());
}
