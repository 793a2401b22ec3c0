// crates/loom-config/src/config.rs
// ============================================================================
// Module: Loom Configuration
// Description: Configuration loading and validation for the Loom server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: loom-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Unknown fields are rejected and cross-field validation fails
//! closed, so a typo surfaces at boot rather than as a silently-defaulted
//! production setting.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use loom_store_sqlite::SqliteJournalMode;
use loom_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "loom.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LOOM_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for the HTTP server.
pub(crate) const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7070";
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Minimum allowed request body limit in bytes.
pub(crate) const MIN_MAX_BODY_BYTES: usize = 1024;
/// Maximum allowed request body limit in bytes.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
/// Minimum store busy timeout in milliseconds.
pub(crate) const MIN_BUSY_TIMEOUT_MS: u64 = 100;
/// Maximum store busy timeout in milliseconds.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default store busy timeout in milliseconds.
pub(crate) const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Minimum migrator request timeout in milliseconds.
pub(crate) const MIN_MIGRATOR_TIMEOUT_MS: u64 = 100;
/// Maximum migrator request timeout in milliseconds.
pub(crate) const MAX_MIGRATOR_TIMEOUT_MS: u64 = 600_000;
/// Default migrator request timeout in milliseconds.
pub(crate) const DEFAULT_MIGRATOR_TIMEOUT_MS: u64 = 5_000;
/// Minimum migrator response size limit in bytes.
pub(crate) const MIN_MIGRATOR_RESPONSE_BYTES: usize = 1024;
/// Maximum migrator response size limit in bytes.
pub(crate) const MAX_MIGRATOR_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
/// Default migrator response size limit in bytes.
pub(crate) const DEFAULT_MIGRATOR_RESPONSE_BYTES: usize = 1024 * 1024;
/// Default user agent for outbound migrator requests.
pub(crate) const DEFAULT_MIGRATOR_USER_AGENT: &str = "loom/0.1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config failed cross-field validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Top-level Loom configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoomConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Registry store backing the migration documents.
    pub registry_store: StoreSectionConfig,
    /// Step event store backing the metrics reads.
    pub event_store: StoreSectionConfig,
    /// Outbound migrator client settings.
    pub migrator: MigratorConfig,
}

impl LoomConfig {
    /// Loads and validates configuration from an explicit path, the
    /// `LOOM_CONFIG` environment variable, or the default filename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing, oversized,
    /// unparsable, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_config_path(path);
        let config = read_config_file(&resolved)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration like [`LoomConfig::load`], but falls back to the
    /// validated defaults when no explicit path is given and the default
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an existing file is invalid.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_config_path(path);
        if path.is_none() && env::var_os(CONFIG_ENV_VAR).is_none() && !resolved.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let config = read_config_file(&resolved)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration across fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.registry_store.validate("registry_store")?;
        self.event_store.validate("event_store")?;
        self.migrator.validate()?;
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    pub bind: String,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Audit log settings.
    pub audit: AuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDR.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            audit: AuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates server settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind address or body limit
    /// is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))?;
        if self.max_body_bytes < MIN_MAX_BODY_BYTES || self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between {MIN_MAX_BODY_BYTES} and \
                 {MAX_MAX_BODY_BYTES}"
            )));
        }
        self.audit.validate()?;
        Ok(())
    }

    /// Parses the validated bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AuditConfig {
    /// Enables audit logging.
    pub enabled: bool,
    /// Optional audit log file; stderr is used when unset.
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the audit path violates limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_limits(path, "server.audit.path")?;
        }
        Ok(())
    }
}

/// Store backend selector.
///
/// # Invariants
/// - Variants are stable for config parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store (non-durable; tests and demos).
    #[default]
    Memory,
    /// `SQLite`-backed durable store.
    Sqlite,
}

/// One store section (`registry_store` or `event_store`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreSectionConfig {
    /// Store backend type.
    #[serde(rename = "type")]
    pub store_type: StoreType,
    /// Database path (required for sqlite).
    pub path: Option<PathBuf>,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreSectionConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::Memory,
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreSectionConfig {
    /// Validates one store section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the section is inconsistent.
    pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid(format!("{section}: sqlite store requires a path"))
                })?;
                validate_path_limits(path, section)?;
            }
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(format!(
                        "{section}: path is only valid for sqlite stores"
                    )));
                }
            }
        }
        if self.busy_timeout_ms < MIN_BUSY_TIMEOUT_MS
            || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS
        {
            return Err(ConfigError::Invalid(format!(
                "{section}: busy_timeout_ms must be between {MIN_BUSY_TIMEOUT_MS} and \
                 {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Outbound migrator client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MigratorConfig {
    /// Allow cleartext HTTP migrator URLs (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum dry-run response size in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist for migrator URLs.
    pub allowed_hosts: Option<Vec<String>>,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: DEFAULT_MIGRATOR_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MIGRATOR_RESPONSE_BYTES,
            allowed_hosts: None,
            user_agent: DEFAULT_MIGRATOR_USER_AGENT.to_string(),
        }
    }
}

impl MigratorConfig {
    /// Validates migrator client settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a limit is out of range or an
    /// allowlist entry is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < MIN_MIGRATOR_TIMEOUT_MS || self.timeout_ms > MAX_MIGRATOR_TIMEOUT_MS
        {
            return Err(ConfigError::Invalid(format!(
                "migrator.timeout_ms must be between {MIN_MIGRATOR_TIMEOUT_MS} and \
                 {MAX_MIGRATOR_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes < MIN_MIGRATOR_RESPONSE_BYTES
            || self.max_response_bytes > MAX_MIGRATOR_RESPONSE_BYTES
        {
            return Err(ConfigError::Invalid(format!(
                "migrator.max_response_bytes must be between {MIN_MIGRATOR_RESPONSE_BYTES} and \
                 {MAX_MIGRATOR_RESPONSE_BYTES}"
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("migrator.user_agent must not be empty".to_string()));
        }
        if let Some(hosts) = &self.allowed_hosts
            && hosts.iter().any(|host| host.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "migrator.allowed_hosts entries must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Loading Helpers
// ============================================================================

/// Resolves the effective config path from the argument, environment, or
/// default filename.
fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Some(value) = env::var_os(CONFIG_ENV_VAR) {
        return PathBuf::from(value);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Reads and parses the config file with fail-closed limits.
fn read_config_file(path: &Path) -> Result<LoomConfig, ConfigError> {
    validate_path_limits(path, "config path")?;
    let metadata = fs::metadata(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    if metadata.len() > u64::try_from(MAX_CONFIG_FILE_SIZE).unwrap_or(u64::MAX) {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let contents = fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    toml::from_str(&contents).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Validates path length limits for configured paths.
fn validate_path_limits(path: &Path, label: &str) -> Result<(), ConfigError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{label}: path exceeds length limit")));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "{label}: path contains an overlong component"
            )));
        }
    }
    Ok(())
}
