// crates/loom-migrator-http/src/config.rs
// ============================================================================
// Module: Migrator HTTP Configuration
// Description: Client configuration for outbound migrator requests.
// Purpose: Bound timeouts, response sizes, and reachable hosts.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Configuration for the migrator HTTP clients. Limits are enforced as hard
//! upper bounds; violations fail the request rather than degrade it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration shared by the dispatch and dry-run clients.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `max_response_bytes` is enforced as a hard upper bound on dry-run bodies.
/// - If `allowed_hosts` is set, only listed hosts are permitted.
/// - URLs with embedded credentials are rejected.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigratorHttpConfig {
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for MigratorHttpConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 5_000,
            max_response_bytes: 1024 * 1024,
            allowed_hosts: None,
            user_agent: "loom/0.1".to_string(),
        }
    }
}
