// crates/loom-server/src/server.rs
// ============================================================================
// Module: Loom HTTP Server
// Description: Server boot over validated configuration.
// Purpose: Bind the listener and serve the orchestration route table.
// Dependencies: axum, loom-config, tokio
// ============================================================================

//! ## Overview
//! [`LoomServer`] turns a validated [`LoomConfig`] into a running HTTP
//! server: adapters and the orchestration service are built once, the route
//! table is mounted, and the listener serves until the process stops.
//! Security posture: requests are untrusted; body limits and the status-code
//! contract are enforced by the route layer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use loom_config::LoomConfig;
use thiserror::Error;

use crate::audit::AuditSink;
use crate::routes::router;
use crate::state::build_server_state;
use crate::state::build_server_state_with_observability;
use crate::telemetry::RequestMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server lifecycle errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration rejected at boot.
    #[error("server config error: {0}")]
    Config(String),
    /// Component initialization failed.
    #[error("server init error: {0}")]
    Init(String),
    /// Transport failure while serving.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Loom HTTP server instance.
pub struct LoomServer {
    /// Validated server configuration.
    config: LoomConfig,
    /// Shared handler state.
    state: Arc<crate::state::ServerState>,
}

impl LoomServer {
    /// Builds a server from configuration with default observability sinks.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or initialization fails.
    pub fn from_config(config: LoomConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let state = build_server_state(&config)?;
        Ok(Self {
            config,
            state,
        })
    }

    /// Builds a server with custom metrics and audit sinks.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or initialization fails.
    pub fn from_config_with_observability(
        config: LoomConfig,
        metrics: Arc<dyn RequestMetrics>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let state = build_server_state_with_observability(&config, metrics, audit)?;
        Ok(Self {
            config,
            state,
        })
    }

    /// Serves requests until the process stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = self
            .config
            .server
            .bind_addr()
            .map_err(|err| ServerError::Config(err.to_string()))?;
        let app = router(Arc::clone(&self.state), self.config.server.max_body_bytes);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}
