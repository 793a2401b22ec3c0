// crates/loom-config/src/lib.rs
// ============================================================================
// Module: Loom Config Library
// Description: Strict TOML configuration for the Loom server.
// Purpose: Load and validate server, store, and migrator settings.
// Dependencies: loom-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Loom Config loads the server's TOML configuration with hard size and path
//! limits, rejects unknown fields, and validates every cross-field
//! constraint before the server boots.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuditConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::DEFAULT_CONFIG_NAME;
pub use config::LoomConfig;
pub use config::MigratorConfig;
pub use config::ServerConfig;
pub use config::StoreSectionConfig;
pub use config::StoreType;
