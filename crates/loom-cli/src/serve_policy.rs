// crates/loom-cli/src/serve_policy.rs
// ============================================================================
// Module: Serve Policy
// Description: Network exposure policy checks for the CLI server launcher.
// Purpose: Enforce safe-by-default bind behavior with explicit opt-in.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Provides safety checks for binding the Loom server to non-loopback
//! addresses. The policy is fail-closed: a non-loopback bind requires
//! explicit opt-in through the CLI flag or the environment variable, and a
//! warning is emitted when the server is network exposed.
//!
//! Security posture: fail closed on unsafe bind configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable enabling non-loopback server binds.
pub const ALLOW_NON_LOOPBACK_ENV: &str = "LOOM_ALLOW_NON_LOOPBACK";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Bind outcome metadata for launcher warnings.
///
/// # Invariants
/// - `network_exposed` is `true` only when a non-loopback bind is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOutcome {
    /// Bound socket address.
    pub bind_addr: SocketAddr,
    /// True when the server is bound to a non-loopback address.
    pub network_exposed: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Serve policy failures for bind safety.
///
/// # Invariants
/// - Variants are stable for CLI error mapping and tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServePolicyError {
    /// Environment variable was set to an invalid value.
    #[error("{ALLOW_NON_LOOPBACK_ENV} must be 0 or 1, got: {value}")]
    InvalidEnv {
        /// Raw environment value.
        value: String,
    },
    /// Bind string failed to parse.
    #[error("bind address failed to parse: {bind} ({error})")]
    InvalidBind {
        /// Raw bind value.
        bind: String,
        /// Parse error message.
        error: String,
    },
    /// Non-loopback binding requires explicit opt-in.
    #[error(
        "refusing non-loopback bind {bind}; pass --allow-non-loopback or set \
         {ALLOW_NON_LOOPBACK_ENV}=1"
    )]
    NonLoopbackOptInRequired {
        /// Bind address.
        bind: String,
    },
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Resolves the non-loopback opt-in flag from CLI and environment.
///
/// # Errors
///
/// Returns [`ServePolicyError::InvalidEnv`] when the environment value is invalid.
pub fn resolve_allow_non_loopback(flag: bool) -> Result<bool, ServePolicyError> {
    if flag {
        return Ok(true);
    }
    let Some(value) = env::var_os(ALLOW_NON_LOOPBACK_ENV) else {
        return Ok(false);
    };
    let value = value.to_string_lossy().to_string();
    match value.as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        _ => Err(ServePolicyError::InvalidEnv {
            value,
        }),
    }
}

/// Enforces the loopback-only bind policy for the server launcher.
///
/// # Errors
///
/// Returns [`ServePolicyError`] when the bind is malformed or non-loopback
/// without opt-in.
pub fn enforce_local_only(
    bind: &str,
    allow_non_loopback: bool,
) -> Result<BindOutcome, ServePolicyError> {
    let addr: SocketAddr = bind.parse().map_err(|err: std::net::AddrParseError| {
        ServePolicyError::InvalidBind {
            bind: bind.to_string(),
            error: err.to_string(),
        }
    })?;
    if addr.ip().is_loopback() {
        return Ok(BindOutcome {
            bind_addr: addr,
            network_exposed: false,
        });
    }
    if !allow_non_loopback {
        return Err(ServePolicyError::NonLoopbackOptInRequired {
            bind: bind.to_string(),
        });
    }
    Ok(BindOutcome {
        bind_addr: addr,
        network_exposed: true,
    })
}

#[cfg(test)]
mod tests;
