// crates/loom-migrator-http/src/client.rs
// ============================================================================
// Module: Migrator HTTP Client Construction
// Description: Shared reqwest client builder for migrator adapters.
// Purpose: Apply timeout, user agent, and redirect policy uniformly.
// Dependencies: reqwest
// ============================================================================

//! ## Overview
//! Both migrator adapters build their client here so timeout, user agent,
//! and the no-redirect policy stay consistent. Redirects are never followed:
//! a migrator that moves must be re-announced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;

use crate::config::MigratorHttpConfig;

// ============================================================================
// SECTION: Client Builder
// ============================================================================

/// Builds the configured HTTP client for migrator requests.
pub(crate) fn build_http_client(config: &MigratorHttpConfig) -> Option<Client> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none())
        .build()
        .ok()
}
