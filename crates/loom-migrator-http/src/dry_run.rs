// crates/loom-migrator-http/src/dry_run.rs
// ============================================================================
// Module: HTTP Dry Runner
// Description: Dry-run client for external migrator workers.
// Purpose: POST dry-run requests and decode bounded JSON results.
// Dependencies: loom-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`HttpDryRunner`] implements the [`loom_core::DryRunner`] port by posting
//! [`DryRunRequest`] bodies to `{migratorUrl}/dry-run` and decoding the JSON
//! [`DryRunResult`]. Responses exceeding the configured size limit fail
//! closed rather than being truncated.
//!
//! Security posture: migrator URLs and response bodies are untrusted; URL
//! policy validation and size limits apply to every request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use loom_core::DryRunError;
use loom_core::DryRunRequest;
use loom_core::DryRunResult;
use loom_core::DryRunner;
use reqwest::Client;

use crate::client::build_http_client;
use crate::config::MigratorHttpConfig;
use crate::policy::endpoint_url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Dry-run endpoint path appended to the migrator base URL.
pub const DRY_RUN_PATH: &str = "dry-run";

// ============================================================================
// SECTION: Dry Runner
// ============================================================================

/// Outbound dry-run client for external migrator workers.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding `max_response_bytes` fail closed.
pub struct HttpDryRunner {
    /// Client configuration, including limits and policy.
    config: MigratorHttpConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpDryRunner {
    /// Creates a new dry runner with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DryRunError`] when the HTTP client cannot be created.
    pub fn new(config: MigratorHttpConfig) -> Result<Self, DryRunError> {
        let client = build_http_client(&config)
            .ok_or_else(|| DryRunError::Failed("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }
}

#[async_trait]
impl DryRunner for HttpDryRunner {
    async fn dry_run(
        &self,
        migrator_url: &str,
        request: &DryRunRequest,
    ) -> Result<DryRunResult, DryRunError> {
        let url = endpoint_url(migrator_url, DRY_RUN_PATH, &self.config)
            .map_err(|err| DryRunError::Failed(err.to_string()))?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|_| DryRunError::Failed("migrator request failed".to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DryRunError::Failed(format!("migrator returned status {status}")));
        }

        let max_bytes = self.config.max_response_bytes;
        let max_bytes_u64 = u64::try_from(max_bytes)
            .map_err(|_| DryRunError::Failed("response size limit exceeds u64".to_string()))?;
        if let Some(expected) = response.content_length()
            && expected > max_bytes_u64
        {
            return Err(DryRunError::Failed("dry-run response exceeds size limit".to_string()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|_| DryRunError::Failed("failed to read dry-run response".to_string()))?;
        if body.len() > max_bytes {
            return Err(DryRunError::Failed("dry-run response exceeds size limit".to_string()));
        }
        serde_json::from_slice(&body)
            .map_err(|_| DryRunError::Failed("dry-run response is not valid json".to_string()))
    }
}
