// crates/loom-store-sqlite/src/lib.rs
// ============================================================================
// Module: Loom SQLite Store Library
// Description: Durable registry and step event persistence on SQLite.
// Purpose: Provide the production storage adapters for the Loom ports.
// Dependencies: loom-core, rusqlite
// ============================================================================

//! ## Overview
//! Loom SQLite Store implements the registry and step-event ports on a
//! single `SQLite` database with WAL journaling and fail-closed loads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
