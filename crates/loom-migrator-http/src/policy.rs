// crates/loom-migrator-http/src/policy.rs
// ============================================================================
// Module: Migrator URL Policy
// Description: Fail-closed URL validation for outbound migrator requests.
// Purpose: Enforce scheme, credential, and host-allowlist policy before I/O.
// Dependencies: url
// ============================================================================

//! ## Overview
//! Migrator base URLs arrive from announcements and are untrusted. Every
//! outbound request validates the target before any connection is opened:
//! cleartext HTTP is blocked unless explicitly allowed, embedded credentials
//! are rejected, and an optional host allowlist restricts where dispatches
//! may go. Validation fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;
use url::Url;

use crate::config::MigratorHttpConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// URL policy violations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlPolicyError {
    /// URL failed to parse.
    #[error("invalid migrator url: {0}")]
    Invalid(String),
    /// Scheme is not permitted by configuration.
    #[error("unsupported migrator url scheme: {0}")]
    UnsupportedScheme(String),
    /// URL embeds credentials.
    #[error("migrator url credentials are not allowed")]
    CredentialsNotAllowed,
    /// URL has no host component.
    #[error("migrator url host required")]
    HostRequired,
    /// Host is not present in the configured allowlist.
    #[error("migrator url host not allowed: {0}")]
    HostNotAllowed(String),
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Builds and validates the endpoint URL for a migrator base URL and path.
///
/// The path is appended to the base with exactly one separating slash, so
/// `http://worker:8080` and `http://worker:8080/` both yield
/// `http://worker:8080/dispatch-step`.
///
/// # Errors
///
/// Returns [`UrlPolicyError`] when the URL is malformed or violates policy.
pub fn endpoint_url(
    base: &str,
    path: &str,
    config: &MigratorHttpConfig,
) -> Result<Url, UrlPolicyError> {
    let joined = format!("{}/{path}", base.trim_end_matches('/'));
    let url = Url::parse(&joined).map_err(|err| UrlPolicyError::Invalid(err.to_string()))?;
    validate_url(&url, config)?;
    Ok(url)
}

/// Validates scheme, credential, and allowlist policy for a parsed URL.
///
/// # Errors
///
/// Returns [`UrlPolicyError`] when the URL violates policy.
pub fn validate_url(url: &Url, config: &MigratorHttpConfig) -> Result<(), UrlPolicyError> {
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        other => return Err(UrlPolicyError::UnsupportedScheme(other.to_string())),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlPolicyError::CredentialsNotAllowed);
    }
    let host = url.host_str().ok_or(UrlPolicyError::HostRequired)?;
    if let Some(allowlist) = &config.allowed_hosts {
        let label = normalize_host_label(host);
        if !is_host_allowed(&label, allowlist) {
            return Err(UrlPolicyError::HostNotAllowed(label));
        }
    }
    Ok(())
}

/// Returns true when the normalized host label appears in the allowlist.
fn is_host_allowed(label: &str, allowlist: &BTreeSet<String>) -> bool {
    allowlist.iter().any(|entry| normalize_host_label(entry) == label)
}

/// Normalizes host labels for allowlist comparisons.
fn normalize_host_label(host: &str) -> String {
    let trimmed = host.trim_end_matches('.');
    let trimmed =
        trimmed.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(trimmed);
    trimmed.to_ascii_lowercase()
}
