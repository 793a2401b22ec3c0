// crates/loom-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Registry and Step Event Store
// Description: Durable RegistryStore and StepEventStore backed by SQLite WAL.
// Purpose: Persist migrations, candidates, and append-only step telemetry.
// Dependencies: loom-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the durable [`RegistryStore`] and
//! [`StepEventStore`] ports on `SQLite`. Migration documents are stored as
//! JSON with candidates broken out into their own table so that
//! single-candidate mutations (status flips, metadata merges) are one
//! transaction each, which realizes the atomicity guarantee of the registry
//! port. Step events land in an append-only table scanned by the metrics
//! read path. Loads fail closed on undecodable documents.
//!
//! Security posture: database contents are untrusted on load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use loom_core::Candidate;
use loom_core::CandidateId;
use loom_core::CandidateStatus;
use loom_core::Migration;
use loom_core::MigrationId;
use loom_core::RegistryError;
use loom_core::RegistryStore;
use loom_core::StepEventError;
use loom_core::StepEventRecord;
use loom_core::StepEventStore;
use loom_core::StepEventType;
use loom_core::StepStatus;
use loom_core::migration::preserve_candidate_statuses;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Migration does not exist.
    #[error("migration not found: {0}")]
    MigrationNotFound(String),
    /// Candidate does not exist within the migration.
    #[error("candidate not found: {0}")]
    CandidateNotFound(String),
}

impl From<SqliteStoreError> for RegistryError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::MigrationNotFound(id) => Self::MigrationNotFound(id),
            SqliteStoreError::CandidateNotFound(id) => Self::CandidateNotFound(id),
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message)
            | SqliteStoreError::Invalid(message)
            | SqliteStoreError::VersionMismatch(message) => Self::Store(message),
        }
    }
}

impl From<SqliteStoreError> for StepEventError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            other => Self::Store(other.to_string()),
        }
    }
}

/// Maps `SQLite` errors to store errors.
fn db_err(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed registry and step event store with WAL support.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens an `SQLite`-backed store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Runs a closure inside one transaction on the shared connection.
    fn with_transaction<T>(
        &self,
        operate: impl FnOnce(&Transaction<'_>) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("store mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        let value = operate(&tx)?;
        tx.commit().map_err(|err| db_err(&err))?;
        drop(guard);
        Ok(value)
    }
}

// ============================================================================
// SECTION: Registry Implementation
// ============================================================================

impl RegistryStore for SqliteStore {
    fn save(&self, migration: &Migration) -> Result<(), RegistryError> {
        let mut document = migration.clone();
        let candidates = std::mem::take(&mut document.candidates);
        let document_json = serde_json::to_string(&document)
            .map_err(|err| RegistryError::Store(err.to_string()))?;
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO migrations (migration_id, document) VALUES (?1, ?2)
                 ON CONFLICT (migration_id) DO UPDATE SET document = excluded.document",
                params![migration.id.as_str(), document_json],
            )
            .map_err(|err| db_err(&err))?;
            replace_candidates(tx, &migration.id, &candidates)
        })
        .map_err(RegistryError::from)
    }

    fn get(&self, id: &MigrationId) -> Result<Option<Migration>, RegistryError> {
        self.with_transaction(|tx| {
            let Some(mut migration) = load_migration_document(tx, id)? else {
                return Ok(None);
            };
            migration.candidates = load_candidates(tx, id)?;
            Ok(Some(migration))
        })
        .map_err(RegistryError::from)
    }

    fn list(&self) -> Result<Vec<Migration>, RegistryError> {
        self.with_transaction(|tx| {
            let ids = {
                let mut stmt = tx
                    .prepare("SELECT migration_id FROM migrations ORDER BY migration_id")
                    .map_err(|err| db_err(&err))?;
                let rows = stmt
                    .query_map(params![], |row| row.get::<_, String>(0))
                    .map_err(|err| db_err(&err))?;
                rows.collect::<Result<Vec<String>, _>>().map_err(|err| db_err(&err))?
            };
            let mut migrations = Vec::with_capacity(ids.len());
            for id in ids {
                let migration_id = MigrationId::new(id);
                if let Some(mut migration) = load_migration_document(tx, &migration_id)? {
                    migration.candidates = load_candidates(tx, &migration_id)?;
                    migrations.push(migration);
                }
            }
            Ok(migrations)
        })
        .map_err(RegistryError::from)
    }

    fn set_candidate_status(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        status: CandidateStatus,
    ) -> Result<(), RegistryError> {
        self.with_transaction(|tx| {
            let updated = tx
                .execute(
                    "UPDATE candidates SET status = ?1 WHERE migration_id = ?2 AND candidate_id \
                     = ?3",
                    params![status.as_str(), migration_id.as_str(), candidate_id.as_str()],
                )
                .map_err(|err| db_err(&err))?;
            if updated == 0 {
                ensure_migration_exists(tx, migration_id)?;
                return Err(SqliteStoreError::CandidateNotFound(candidate_id.to_string()));
            }
            Ok(())
        })
        .map_err(RegistryError::from)
    }

    fn save_candidates(
        &self,
        migration_id: &MigrationId,
        mut candidates: Vec<Candidate>,
    ) -> Result<(), RegistryError> {
        self.with_transaction(|tx| {
            ensure_migration_exists(tx, migration_id)?;
            let existing = load_candidates(tx, migration_id)?;
            preserve_candidate_statuses(&existing, &mut candidates);
            replace_candidates(tx, migration_id, &candidates)
        })
        .map_err(RegistryError::from)
    }

    fn get_candidates(&self, migration_id: &MigrationId) -> Result<Vec<Candidate>, RegistryError> {
        self.with_transaction(|tx| {
            ensure_migration_exists(tx, migration_id)?;
            load_candidates(tx, migration_id)
        })
        .map_err(RegistryError::from)
    }

    fn update_candidate_metadata(
        &self,
        migration_id: &MigrationId,
        candidate_id: &CandidateId,
        metadata: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        self.with_transaction(|tx| {
            let document: Option<String> = tx
                .query_row(
                    "SELECT document FROM candidates WHERE migration_id = ?1 AND candidate_id = \
                     ?2",
                    params![migration_id.as_str(), candidate_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_err(&err))?;
            let Some(document) = document else {
                ensure_migration_exists(tx, migration_id)?;
                return Err(SqliteStoreError::CandidateNotFound(candidate_id.to_string()));
            };
            let mut candidate: Candidate = serde_json::from_str(&document)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            for (key, value) in metadata {
                candidate.metadata.insert(key.clone(), value.clone());
            }
            let updated = serde_json::to_string(&candidate)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            tx.execute(
                "UPDATE candidates SET document = ?1 WHERE migration_id = ?2 AND candidate_id = \
                 ?3",
                params![updated, migration_id.as_str(), candidate_id.as_str()],
            )
            .map_err(|err| db_err(&err))?;
            Ok(())
        })
        .map_err(RegistryError::from)
    }

    fn readiness(&self) -> Result<(), RegistryError> {
        self.with_transaction(check_schema_version).map_err(RegistryError::from)
    }
}

// ============================================================================
// SECTION: Step Event Implementation
// ============================================================================

impl StepEventStore for SqliteStore {
    fn append(&self, record: &StepEventRecord) -> Result<(), StepEventError> {
        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|err| StepEventError::Store(err.to_string()))?;
        let created_at_json = serde_json::to_string(&record.created_at)
            .map_err(|err| StepEventError::Store(err.to_string()))?;
        let duration_ms = record
            .duration_ms
            .map(i64::try_from)
            .transpose()
            .map_err(|_| StepEventError::Store("duration exceeds i64".to_string()))?;
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO step_events (
                    migration_id, candidate_id, step_name, event_type,
                    status, duration_ms, metadata_json, created_at_json
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.migration_id.as_str(),
                    record.candidate_id.as_str(),
                    record.step_name.as_str(),
                    record.event_type.as_str(),
                    record.status.as_str(),
                    duration_ms,
                    metadata_json,
                    created_at_json,
                ],
            )
            .map_err(|err| db_err(&err))?;
            Ok(())
        })
        .map_err(StepEventError::from)
    }

    fn list(
        &self,
        migration_id: Option<&MigrationId>,
    ) -> Result<Vec<StepEventRecord>, StepEventError> {
        self.with_transaction(|tx| {
            let rows = if let Some(migration_id) = migration_id {
                let mut stmt = tx
                    .prepare(
                        "SELECT migration_id, candidate_id, step_name, event_type, status, \
                         duration_ms, metadata_json, created_at_json FROM step_events WHERE \
                         migration_id = ?1 ORDER BY event_id",
                    )
                    .map_err(|err| db_err(&err))?;
                let rows = stmt
                    .query_map(params![migration_id.as_str()], map_event_row)
                    .map_err(|err| db_err(&err))?;
                rows.collect::<Result<Vec<EventRow>, _>>().map_err(|err| db_err(&err))?
            } else {
                let mut stmt = tx
                    .prepare(
                        "SELECT migration_id, candidate_id, step_name, event_type, status, \
                         duration_ms, metadata_json, created_at_json FROM step_events ORDER BY \
                         event_id",
                    )
                    .map_err(|err| db_err(&err))?;
                let rows = stmt.query_map(params![], map_event_row).map_err(|err| db_err(&err))?;
                rows.collect::<Result<Vec<EventRow>, _>>().map_err(|err| db_err(&err))?
            };
            rows.into_iter().map(build_event_record).collect()
        })
        .map_err(StepEventError::from)
    }

    fn readiness(&self) -> Result<(), StepEventError> {
        self.with_transaction(check_schema_version).map_err(StepEventError::from)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Step event row data loaded from the store.
#[derive(Debug)]
struct EventRow {
    /// Migration identifier string.
    migration_id: String,
    /// Candidate identifier string.
    candidate_id: String,
    /// Step name string.
    step_name: String,
    /// Event type label.
    event_type: String,
    /// Status label.
    status: String,
    /// Optional duration in milliseconds.
    duration_ms: Option<i64>,
    /// JSON-encoded metadata map.
    metadata_json: String,
    /// JSON-encoded creation timestamp.
    created_at_json: String,
}

/// Maps a `SQLite` row into an event row payload.
fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        migration_id: row.get(0)?,
        candidate_id: row.get(1)?,
        step_name: row.get(2)?,
        event_type: row.get(3)?,
        status: row.get(4)?,
        duration_ms: row.get(5)?,
        metadata_json: row.get(6)?,
        created_at_json: row.get(7)?,
    })
}

/// Builds a validated step event record from stored row data.
fn build_event_record(row: EventRow) -> Result<StepEventRecord, SqliteStoreError> {
    let event_type = StepEventType::from_label(&row.event_type).ok_or_else(|| {
        SqliteStoreError::Invalid(format!("unknown event type: {}", row.event_type))
    })?;
    let status = StepStatus::from_label(&row.status)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unknown step status: {}", row.status)))?;
    let duration_ms = row
        .duration_ms
        .map(u64::try_from)
        .transpose()
        .map_err(|_| SqliteStoreError::Invalid("negative event duration".to_string()))?;
    let metadata = serde_json::from_str(&row.metadata_json)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let created_at = serde_json::from_str(&row.created_at_json)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    Ok(StepEventRecord {
        migration_id: MigrationId::new(row.migration_id),
        candidate_id: CandidateId::new(row.candidate_id),
        step_name: loom_core::StepName::new(row.step_name),
        event_type,
        status,
        duration_ms,
        metadata,
        created_at,
    })
}

// ============================================================================
// SECTION: Registry Helpers
// ============================================================================

/// Fails with `MigrationNotFound` when the migration row is absent.
fn ensure_migration_exists(
    tx: &Transaction<'_>,
    migration_id: &MigrationId,
) -> Result<(), SqliteStoreError> {
    let exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM migrations WHERE migration_id = ?1",
            params![migration_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| db_err(&err))?;
    if exists.is_none() {
        return Err(SqliteStoreError::MigrationNotFound(migration_id.to_string()));
    }
    Ok(())
}

/// Loads the migration document without its candidates.
fn load_migration_document(
    tx: &Transaction<'_>,
    migration_id: &MigrationId,
) -> Result<Option<Migration>, SqliteStoreError> {
    let document: Option<String> = tx
        .query_row(
            "SELECT document FROM migrations WHERE migration_id = ?1",
            params![migration_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| db_err(&err))?;
    document
        .map(|document| {
            serde_json::from_str(&document)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))
        })
        .transpose()
}

/// Loads candidates in insertion order, with the status column authoritative.
fn load_candidates(
    tx: &Transaction<'_>,
    migration_id: &MigrationId,
) -> Result<Vec<Candidate>, SqliteStoreError> {
    let mut stmt = tx
        .prepare(
            "SELECT document, status FROM candidates WHERE migration_id = ?1 ORDER BY position",
        )
        .map_err(|err| db_err(&err))?;
    let rows = stmt
        .query_map(params![migration_id.as_str()], |row| {
            let document: String = row.get(0)?;
            let status: String = row.get(1)?;
            Ok((document, status))
        })
        .map_err(|err| db_err(&err))?;
    let mut candidates = Vec::new();
    for row in rows {
        let (document, status) = row.map_err(|err| db_err(&err))?;
        let mut candidate: Candidate = serde_json::from_str(&document)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        candidate.status = CandidateStatus::from_label(&status).ok_or_else(|| {
            SqliteStoreError::Invalid(format!("unknown candidate status: {status}"))
        })?;
        candidates.push(candidate);
    }
    Ok(candidates)
}

/// Replaces the candidate rows of a migration inside one transaction.
fn replace_candidates(
    tx: &Transaction<'_>,
    migration_id: &MigrationId,
    candidates: &[Candidate],
) -> Result<(), SqliteStoreError> {
    tx.execute("DELETE FROM candidates WHERE migration_id = ?1", params![migration_id.as_str()])
        .map_err(|err| db_err(&err))?;
    for (position, candidate) in candidates.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| SqliteStoreError::Invalid("candidate position too large".to_string()))?;
        let document = serde_json::to_string(candidate)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        tx.execute(
            "INSERT INTO candidates (migration_id, candidate_id, position, status, document)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                migration_id.as_str(),
                candidate.id.as_str(),
                position,
                candidate.status.as_str(),
                document,
            ],
        )
        .map_err(|err| db_err(&err))?;
    }
    Ok(())
}

/// Verifies the stored schema version for readiness probes.
fn check_schema_version(tx: &Transaction<'_>) -> Result<(), SqliteStoreError> {
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_err(&err))?;
    match version {
        Some(value) if value == SCHEMA_VERSION => Ok(()),
        Some(value) => {
            Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")))
        }
        None => Err(SqliteStoreError::VersionMismatch("schema version missing".to_string())),
    }
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_err(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_err(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_err(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_err(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_err(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_err(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_err(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS migrations (
                    migration_id TEXT NOT NULL PRIMARY KEY,
                    document TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS candidates (
                    migration_id TEXT NOT NULL,
                    candidate_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    document TEXT NOT NULL,
                    PRIMARY KEY (migration_id, candidate_id),
                    FOREIGN KEY (migration_id)
                        REFERENCES migrations(migration_id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_candidates_migration
                    ON candidates (migration_id, position);
                CREATE TABLE IF NOT EXISTS step_events (
                    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    migration_id TEXT NOT NULL,
                    candidate_id TEXT NOT NULL,
                    step_name TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    duration_ms INTEGER,
                    metadata_json TEXT NOT NULL,
                    created_at_json TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_step_events_migration
                    ON step_events (migration_id, event_id);",
            )
            .map_err(|err| db_err(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_err(&err))?;
    Ok(())
}
