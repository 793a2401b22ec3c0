// crates/loom-server/src/state.rs
// ============================================================================
// Module: Server State and Wiring
// Description: Builds stores, engine, migrator clients, and the service.
// Purpose: Turn validated configuration into a runnable orchestration stack.
// Dependencies: loom-config, loom-core, loom-engine, loom-migrator-http, loom-store-sqlite
// ============================================================================

//! ## Overview
//! Server state owns the orchestration service plus the observability sinks.
//! The build functions translate each config section into its adapter:
//! memory or `SQLite` stores, the HTTP migrator clients, and the local
//! execution engine with the candidate run program registered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use loom_config::AuditConfig;
use loom_config::LoomConfig;
use loom_config::MigratorConfig;
use loom_config::StoreSectionConfig;
use loom_config::StoreType;
use loom_core::CandidateRun;
use loom_core::Clock;
use loom_core::InMemoryRegistryStore;
use loom_core::InMemoryStepEventStore;
use loom_core::OrchestrationService;
use loom_core::SharedRegistryStore;
use loom_core::SharedStepEventStore;
use loom_engine::LocalExecutionEngine;
use loom_migrator_http::HttpDryRunner;
use loom_migrator_http::HttpMigratorNotifier;
use loom_migrator_http::MigratorHttpConfig;
use loom_store_sqlite::SqliteStore;
use loom_store_sqlite::SqliteStoreConfig;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::clock::SystemClock;
use crate::server::ServerError;
use crate::telemetry::NoopMetrics;
use crate::telemetry::RequestMetrics;

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state for HTTP handlers.
pub struct ServerState {
    /// Orchestration service facade.
    pub service: OrchestrationService,
    /// Metrics sink for request telemetry.
    pub metrics: Arc<dyn RequestMetrics>,
    /// Audit sink for request logging.
    pub audit: Arc<dyn AuditSink>,
}

/// Builds the full server state from validated configuration.
///
/// # Errors
///
/// Returns [`ServerError`] when an adapter cannot be initialized.
pub fn build_server_state(config: &LoomConfig) -> Result<Arc<ServerState>, ServerError> {
    build_server_state_with_observability(
        config,
        Arc::new(NoopMetrics),
        build_audit_sink(&config.server.audit)?,
    )
}

/// Builds the server state with custom metrics and audit sinks.
///
/// # Errors
///
/// Returns [`ServerError`] when an adapter cannot be initialized.
pub fn build_server_state_with_observability(
    config: &LoomConfig,
    metrics: Arc<dyn RequestMetrics>,
    audit: Arc<dyn AuditSink>,
) -> Result<Arc<ServerState>, ServerError> {
    let registry = build_registry_store(&config.registry_store)?;
    let events = build_event_store(&config.event_store)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let migrator_config = migrator_http_config(&config.migrator);
    let notifier = HttpMigratorNotifier::new(migrator_config.clone())
        .map_err(|err| ServerError::Init(err.to_string()))?;
    let dry_runner = HttpDryRunner::new(migrator_config)
        .map_err(|err| ServerError::Init(err.to_string()))?;

    let program = CandidateRun::new(
        Arc::new(notifier),
        registry.clone(),
        events.clone(),
        Arc::clone(&clock),
    );
    let engine = LocalExecutionEngine::builder()
        .program(program)
        .build()
        .map_err(|err| ServerError::Init(err.to_string()))?;

    let service = OrchestrationService::new(
        registry,
        events,
        Arc::new(engine),
        Arc::new(dry_runner),
        clock,
    );
    Ok(Arc::new(ServerState {
        service,
        metrics,
        audit,
    }))
}

// ============================================================================
// SECTION: Adapter Builders
// ============================================================================

/// Builds the registry store from its config section.
fn build_registry_store(config: &StoreSectionConfig) -> Result<SharedRegistryStore, ServerError> {
    match config.store_type {
        StoreType::Memory => Ok(SharedRegistryStore::from_store(InMemoryRegistryStore::new())),
        StoreType::Sqlite => {
            let store = open_sqlite(config, "registry_store")?;
            Ok(SharedRegistryStore::from_store(store))
        }
    }
}

/// Builds the step event store from its config section.
fn build_event_store(config: &StoreSectionConfig) -> Result<SharedStepEventStore, ServerError> {
    match config.store_type {
        StoreType::Memory => Ok(SharedStepEventStore::from_store(InMemoryStepEventStore::new())),
        StoreType::Sqlite => {
            let store = open_sqlite(config, "event_store")?;
            Ok(SharedStepEventStore::from_store(store))
        }
    }
}

/// Opens a `SQLite` store for a config section.
fn open_sqlite(config: &StoreSectionConfig, section: &str) -> Result<SqliteStore, ServerError> {
    let path = config
        .path
        .clone()
        .ok_or_else(|| ServerError::Config(format!("{section}: sqlite store requires path")))?;
    let sqlite_config = SqliteStoreConfig {
        path,
        busy_timeout_ms: config.busy_timeout_ms,
        journal_mode: config.journal_mode,
        sync_mode: config.sync_mode,
    };
    SqliteStore::new(&sqlite_config).map_err(|err| ServerError::Init(err.to_string()))
}

/// Translates the migrator config section into the client configuration.
fn migrator_http_config(config: &MigratorConfig) -> MigratorHttpConfig {
    MigratorHttpConfig {
        allow_http: config.allow_http,
        timeout_ms: config.timeout_ms,
        max_response_bytes: config.max_response_bytes,
        allowed_hosts: config
            .allowed_hosts
            .as_ref()
            .map(|hosts| hosts.iter().cloned().collect::<BTreeSet<String>>()),
        user_agent: config.user_agent.clone(),
    }
}

/// Builds an audit sink from server configuration.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    if let Some(path) = &config.path {
        let sink = FileAuditSink::new(path)
            .map_err(|err| ServerError::Config(format!("audit log open failed: {err}")))?;
        return Ok(Arc::new(sink));
    }
    Ok(Arc::new(StderrAuditSink))
}
