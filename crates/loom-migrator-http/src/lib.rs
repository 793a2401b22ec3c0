// crates/loom-migrator-http/src/lib.rs
// ============================================================================
// Module: Loom Migrator HTTP Library
// Description: Outbound HTTP adapters for the external migrator.
// Purpose: Implement the notifier and dry-runner ports over reqwest.
// Dependencies: loom-core, reqwest, url
// ============================================================================

//! ## Overview
//! Loom Migrator HTTP provides the outbound adapters that carry step
//! dispatches and dry-runs to external migrator workers, with fail-closed
//! URL policy and bounded response handling.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub(crate) mod client;
pub mod config;
pub mod dry_run;
pub mod notifier;
pub mod policy;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::MigratorHttpConfig;
pub use dry_run::DRY_RUN_PATH;
pub use dry_run::HttpDryRunner;
pub use notifier::DISPATCH_STEP_PATH;
pub use notifier::HttpMigratorNotifier;
pub use policy::UrlPolicyError;
pub use policy::endpoint_url;
pub use policy::validate_url;
