// crates/loom-migrator-http/src/notifier.rs
// ============================================================================
// Module: HTTP Migrator Notifier
// Description: Step dispatch client for external migrator workers.
// Purpose: POST dispatch requests with fail-closed URL policy.
// Dependencies: loom-core, reqwest
// ============================================================================

//! ## Overview
//! [`HttpMigratorNotifier`] implements the [`loom_core::MigratorNotifier`]
//! port by posting [`DispatchStepRequest`] bodies to
//! `{migratorUrl}/dispatch-step`. Any non-2xx response or transport failure
//! is a failed dispatch; the run sequencer holds the step and re-dispatches
//! on retry. The response body is ignored.
//!
//! Security posture: migrator URLs are untrusted announcement data; every
//! request passes URL policy validation before I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use loom_core::DispatchStepRequest;
use loom_core::MigratorNotifier;
use loom_core::NotifyError;
use reqwest::Client;

use crate::client::build_http_client;
use crate::config::MigratorHttpConfig;
use crate::policy::endpoint_url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dispatch endpoint path appended to the migrator base URL.
pub const DISPATCH_STEP_PATH: &str = "dispatch-step";

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Outbound dispatch client for external migrator workers.
///
/// # Invariants
/// - Redirects are not followed.
/// - Success is any 2xx status; the response body is ignored.
pub struct HttpMigratorNotifier {
    /// Client configuration, including limits and policy.
    config: MigratorHttpConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpMigratorNotifier {
    /// Creates a new notifier with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the HTTP client cannot be created.
    pub fn new(config: MigratorHttpConfig) -> Result<Self, NotifyError> {
        let client = build_http_client(&config)
            .ok_or_else(|| NotifyError::DispatchFailed("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }
}

#[async_trait]
impl MigratorNotifier for HttpMigratorNotifier {
    async fn dispatch(&self, request: &DispatchStepRequest) -> Result<(), NotifyError> {
        let url = endpoint_url(&request.migrator_url, DISPATCH_STEP_PATH, &self.config)
            .map_err(|err| NotifyError::DispatchFailed(err.to_string()))?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|_| NotifyError::DispatchFailed("migrator request failed".to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::DispatchFailed(format!(
                "migrator returned status {status}"
            )));
        }
        Ok(())
    }
}
